//! Per-router contact history
//!
//! Social routers keep, per peer, the durations of finished contacts plus
//! the start times of contacts still open. Community detection consumes
//! cumulative contact time; centrality consumes windowed encounter counts.

use std::collections::{BTreeMap, BTreeSet};

use crate::host::HostId;

#[derive(Debug, Default, Clone)]
pub struct ContactHistory {
    /// Finished contacts per peer as (start, end) pairs, in order
    durations: BTreeMap<HostId, Vec<(f64, f64)>>,
    /// Start times of currently open contacts
    open: BTreeMap<HostId, f64>,
}

impl ContactHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_up(&mut self, peer: HostId, now: f64) {
        self.open.entry(peer).or_insert(now);
    }

    /// Close an open contact, returning the cumulative contact time with
    /// the peer including the contact just finished
    pub fn connection_down(&mut self, peer: HostId, now: f64) -> f64 {
        if let Some(start) = self.open.remove(&peer)
            && now > start
        {
            self.durations.entry(peer).or_default().push((start, now));
        }
        self.cumulative(peer, now)
    }

    /// Total contact seconds with a peer, counting any open contact up to
    /// `now`
    pub fn cumulative(&self, peer: HostId, now: f64) -> f64 {
        let closed: f64 = self
            .durations
            .get(&peer)
            .map(|list| list.iter().map(|(s, e)| e - s).sum())
            .unwrap_or(0.0);
        let open = self
            .open
            .get(&peer)
            .map(|&s| (now - s).max(0.0))
            .unwrap_or(0.0);
        closed + open
    }

    /// Peers ever contacted
    pub fn peers(&self) -> BTreeSet<HostId> {
        self.durations
            .keys()
            .chain(self.open.keys())
            .copied()
            .collect()
    }

    /// Per-peer count of contacts overlapping the window `(w0, w1]`
    ///
    /// Open contacts count with their end pinned to `now`.
    pub fn window_contacts(&self, w0: f64, w1: f64, now: f64) -> BTreeMap<HostId, usize> {
        let mut counts: BTreeMap<HostId, usize> = BTreeMap::new();
        let overlaps = |s: f64, e: f64| s <= w1 && e > w0;
        for (&peer, list) in &self.durations {
            let n = list.iter().filter(|(s, e)| overlaps(*s, *e)).count();
            if n > 0 {
                *counts.entry(peer).or_insert(0) += n;
            }
        }
        for (&peer, &s) in &self.open {
            if overlaps(s, now) {
                *counts.entry(peer).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cumulative_includes_open_contact() {
        let mut history = ContactHistory::new();
        history.connection_up(HostId(1), 10.0);
        assert!((history.cumulative(HostId(1), 25.0) - 15.0).abs() < 1e-12);
        let total = history.connection_down(HostId(1), 30.0);
        assert!((total - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_cumulative_sums_contacts() {
        let mut history = ContactHistory::new();
        history.connection_up(HostId(1), 0.0);
        history.connection_down(HostId(1), 5.0);
        history.connection_up(HostId(1), 100.0);
        let total = history.connection_down(HostId(1), 115.0);
        assert!((total - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_window_contacts() {
        let mut history = ContactHistory::new();
        history.connection_up(HostId(1), 0.0);
        history.connection_down(HostId(1), 10.0);
        history.connection_up(HostId(1), 50.0);
        history.connection_down(HostId(1), 60.0);
        history.connection_up(HostId(2), 55.0);

        // Window (40, 70]: one finished contact of peer 1, open contact of 2
        let counts = history.window_contacts(40.0, 70.0, 65.0);
        assert_eq!(counts.get(&HostId(1)), Some(&1));
        assert_eq!(counts.get(&HostId(2)), Some(&1));

        // Window (0, 20]: only the first contact of peer 1
        let counts = history.window_contacts(0.0, 20.0, 65.0);
        assert_eq!(counts.get(&HostId(1)), Some(&1));
        assert_eq!(counts.get(&HostId(2)), None);
    }

    #[test]
    fn test_down_without_up_is_ignored() {
        let mut history = ContactHistory::new();
        let total = history.connection_down(HostId(4), 10.0);
        assert_eq!(total, 0.0);
        assert!(history.peers().is_empty());
    }
}
