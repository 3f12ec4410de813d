//! PeopleRank routing
//!
//! Hosts sharing a group prefix form the social graph; the group table is
//! built once by the world after host construction. Ranks follow the
//! damped PageRank-style recurrence
//! `PeR_i = (1 − d) + d · Σ PeR_j / degree(j)` over social neighbors,
//! refreshed on each contact with a neighbor using the peer's latest rank
//! and degree. A message moves to a peer with a strictly higher rank or
//! to its destination.

use std::collections::BTreeMap;

use crate::connection::TransferResult;
use crate::error::SimResult;
use crate::host::HostId;
use crate::settings::Settings;
use crate::world::World;

use super::{exchange_deliverable_messages, fifo_ids};

#[derive(Debug, Clone)]
pub struct PeopleRankConfig {
    /// Damping factor d
    pub damping: f64,
}

impl Default for PeopleRankConfig {
    fn default() -> Self {
        Self { damping: 0.8 }
    }
}

impl PeopleRankConfig {
    pub fn from_settings(settings: &Settings) -> SimResult<Self> {
        Ok(Self {
            damping: settings.get_f64_or("PeopleRankRouter.dampingFactor", 0.8)?,
        })
    }
}

#[derive(Debug)]
pub struct PeopleRankRouter {
    config: PeopleRankConfig,
    rank: f64,
    /// Latest (rank, degree) observed per social neighbor
    neighbor_stats: BTreeMap<HostId, (f64, usize)>,
}

impl PeopleRankRouter {
    pub fn new(config: PeopleRankConfig) -> Self {
        Self {
            config,
            rank: 0.0,
            neighbor_stats: BTreeMap::new(),
        }
    }

    pub fn rank(&self) -> f64 {
        self.rank
    }

    fn refresh(&mut self, peer: HostId, peer_rank: f64, peer_degree: usize) {
        self.neighbor_stats.insert(peer, (peer_rank, peer_degree));
        let sum: f64 = self
            .neighbor_stats
            .values()
            .filter(|(_, degree)| *degree > 0)
            .map(|(rank, degree)| rank / *degree as f64)
            .sum();
        self.rank = (1.0 - self.config.damping) + self.config.damping * sum;
    }
}

pub(crate) fn changed_connection(world: &mut World, host: HostId, peer: HostId, up: bool) {
    if !up {
        return;
    }
    // Only contacts with social neighbors (same group) update the rank
    if world.host(host).group != world.host(peer).group {
        return;
    }
    let Some(peer_router) = world.router(peer).as_people_rank() else {
        return;
    };
    let peer_rank = peer_router.rank();
    let peer_degree = world
        .group_members(world.host(peer).group)
        .len()
        .saturating_sub(1);
    if let Some(mine) = world.router_mut(host).as_people_rank_mut() {
        mine.refresh(peer, peer_rank, peer_degree);
    }
}

pub(crate) fn update(world: &mut World, host: HostId) {
    if exchange_deliverable_messages(world, host) {
        return;
    }

    let my_rank = match world.router(host).as_people_rank() {
        Some(r) => r.rank(),
        None => return,
    };

    let msgs = fifo_ids(world, host);
    for conn_id in world.connections_of(host) {
        let Some(conn) = world.connection(conn_id) else {
            continue;
        };
        let peer = conn.peer_of(host);
        let Some(peer_router) = world.router(peer).as_people_rank() else {
            continue;
        };
        // Deliverables were already tried; everything else needs a
        // strictly higher rank at the peer
        if peer_router.rank() <= my_rank {
            continue;
        }
        for id in &msgs {
            {
                let mine = world.router(host);
                let Some(m) = mine.buffer.get(id) else {
                    continue;
                };
                if m.to == peer {
                    continue;
                }
                let theirs = world.router(peer);
                if theirs.buffer.has(id) || theirs.is_delivered(id) {
                    continue;
                }
            }
            match world.start_transfer(conn_id, host, id) {
                TransferResult::RcvOk => return,
                TransferResult::TryLaterBusy => break,
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_recurrence() {
        let mut router = PeopleRankRouter::new(PeopleRankConfig { damping: 0.8 });
        assert_eq!(router.rank(), 0.0);

        // One neighbor with rank 1.0 and degree 2
        router.refresh(HostId(1), 1.0, 2);
        assert!((router.rank() - (0.2 + 0.8 * 0.5)).abs() < 1e-12);

        // Second neighbor; sum = 1.0/2 + 0.5/1
        router.refresh(HostId(2), 0.5, 1);
        assert!((router.rank() - (0.2 + 0.8 * 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_zero_degree_neighbors_ignored() {
        let mut router = PeopleRankRouter::new(PeopleRankConfig::default());
        router.refresh(HostId(1), 5.0, 0);
        assert!((router.rank() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_refresh_replaces_stale_stats() {
        let mut router = PeopleRankRouter::new(PeopleRankConfig { damping: 0.8 });
        router.refresh(HostId(1), 1.0, 1);
        let first = router.rank();
        router.refresh(HostId(1), 2.0, 1);
        assert!(router.rank() > first);
        assert_eq!(router.neighbor_stats.len(), 1);
    }
}
