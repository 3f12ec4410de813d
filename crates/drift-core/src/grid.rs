//! Uniform-grid neighbor lookup
//!
//! Connectivity detection buckets hosts into square cells sized
//! `cellSizeMult × maxTransmitRange` so each host only examines hosts in
//! its own and adjacent cells instead of the full O(N²) pair set.

use std::collections::HashMap;

use crate::coord::Coord;
use crate::host::HostId;

#[derive(Debug, Default)]
pub struct ConnectivityGrid {
    cell: f64,
    buckets: HashMap<(i64, i64), Vec<HostId>>,
}

impl ConnectivityGrid {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell: cell_size.max(1.0),
            buckets: HashMap::new(),
        }
    }

    fn key(&self, loc: Coord) -> (i64, i64) {
        (
            (loc.x / self.cell).floor() as i64,
            (loc.y / self.cell).floor() as i64,
        )
    }

    /// Rebuild the grid from current host positions
    ///
    /// Hosts must be supplied in address order so bucket contents, and
    /// therefore neighbor scan order, stay deterministic.
    pub fn rebuild(&mut self, hosts: impl Iterator<Item = (HostId, Coord)>) {
        self.buckets.clear();
        for (id, loc) in hosts {
            self.buckets.entry(self.key(loc)).or_default().push(id);
        }
    }

    /// Hosts in the 3×3 cell neighborhood around `loc`
    ///
    /// A superset of the hosts within one cell size of `loc`; callers still
    /// apply the exact range check.
    pub fn nearby(&self, loc: Coord) -> Vec<HostId> {
        let (cx, cy) = self.key(loc);
        let mut found = Vec::new();
        for dy in -1..=1 {
            for dx in -1..=1 {
                if let Some(bucket) = self.buckets.get(&(cx + dx, cy + dy)) {
                    found.extend_from_slice(bucket);
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearby_finds_adjacent_cells() {
        let mut grid = ConnectivityGrid::new(10.0);
        grid.rebuild(
            [
                (HostId(0), Coord::new(5.0, 5.0)),
                (HostId(1), Coord::new(12.0, 5.0)),
                (HostId(2), Coord::new(95.0, 95.0)),
            ]
            .into_iter(),
        );

        let near = grid.nearby(Coord::new(5.0, 5.0));
        assert!(near.contains(&HostId(0)));
        assert!(near.contains(&HostId(1)));
        assert!(!near.contains(&HostId(2)));
    }

    #[test]
    fn test_negative_coordinates() {
        let mut grid = ConnectivityGrid::new(10.0);
        grid.rebuild(
            [
                (HostId(0), Coord::new(-5.0, -5.0)),
                (HostId(1), Coord::new(3.0, 3.0)),
            ]
            .into_iter(),
        );
        let near = grid.nearby(Coord::new(-1.0, -1.0));
        assert!(near.contains(&HostId(0)));
        assert!(near.contains(&HostId(1)));
    }
}
