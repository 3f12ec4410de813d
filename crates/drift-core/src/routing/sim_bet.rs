//! SimBet routing
//!
//! Forwarding utility combines social similarity and an aged betweenness
//! estimate: `U(x) = α · sim(a,x) + (1 − α) · B_x`. Similarity is the
//! Jaccard index of contact sets; betweenness for a peer is the count of
//! known hosts whose contact sets contain it, smoothed with factor β on
//! each contact. Contact-set knowledge is merged from peers on contact.

use std::collections::{BTreeMap, BTreeSet};

use crate::connection::TransferResult;
use crate::error::SimResult;
use crate::host::HostId;
use crate::settings::Settings;
use crate::world::World;

use super::{exchange_deliverable_messages, fifo_ids};

#[derive(Debug, Clone)]
pub struct SimBetConfig {
    /// Weight of similarity against betweenness
    pub alpha: f64,
    /// Smoothing factor for betweenness updates
    pub beta: f64,
}

impl Default for SimBetConfig {
    fn default() -> Self {
        Self {
            alpha: 0.7,
            beta: 0.3,
        }
    }
}

impl SimBetConfig {
    pub fn from_settings(settings: &Settings) -> SimResult<Self> {
        Ok(Self {
            alpha: settings.get_f64_or("SimBetRouter.alpha", 0.7)?,
            beta: settings.get_f64_or("SimBetRouter.beta", 0.3)?,
        })
    }
}

#[derive(Debug)]
pub struct SimBetRouter {
    config: SimBetConfig,
    me: HostId,
    /// Known contact sets, own set included under `me`
    contacts: BTreeMap<HostId, BTreeSet<HostId>>,
    /// Smoothed betweenness estimates
    betweenness: BTreeMap<HostId, f64>,
}

impl SimBetRouter {
    pub fn new(config: SimBetConfig) -> Self {
        Self {
            config,
            me: HostId(usize::MAX),
            contacts: BTreeMap::new(),
            betweenness: BTreeMap::new(),
        }
    }

    pub(crate) fn init(&mut self, me: HostId) {
        self.me = me;
        self.contacts.insert(me, BTreeSet::new());
    }

    /// This host's own contact set
    pub fn contact_set(&self) -> &BTreeSet<HostId> {
        self.contacts.get(&self.me).expect("initialized at add_host")
    }

    pub fn betweenness_of(&self, host: HostId) -> f64 {
        self.betweenness.get(&host).copied().unwrap_or(0.0)
    }

    /// Jaccard similarity between the own contact set and another set
    pub fn similarity(&self, other: &BTreeSet<HostId>) -> f64 {
        let mine = self.contact_set();
        if mine.is_empty() && other.is_empty() {
            return 0.0;
        }
        let intersection = mine.intersection(other).count();
        let union = mine.len() + other.len() - intersection;
        if union == 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    }

    fn merge_knowledge(&mut self, peer_contacts: &BTreeMap<HostId, BTreeSet<HostId>>) {
        for (owner, set) in peer_contacts {
            self.contacts.entry(*owner).or_default().extend(set);
        }
    }

    /// Smooth the betweenness estimate for `subject` toward the current
    /// count of known hosts whose contact sets contain it
    fn refresh_betweenness(&mut self, subject: HostId) {
        let fresh = self
            .contacts
            .iter()
            .filter(|(owner, set)| **owner != subject && set.contains(&subject))
            .count() as f64;
        let beta = self.config.beta;
        let entry = self.betweenness.entry(subject).or_insert(0.0);
        *entry = (1.0 - beta) * *entry + beta * fresh;
    }

    fn utility(&self, subject: HostId, similarity: f64) -> f64 {
        self.config.alpha * similarity + (1.0 - self.config.alpha) * self.betweenness_of(subject)
    }
}

pub(crate) fn changed_connection(world: &mut World, host: HostId, peer: HostId, up: bool) {
    if !up {
        return;
    }
    // Contact-set knowledge is exchanged only between SimBet routers
    let peer_knowledge = world
        .router(peer)
        .as_sim_bet()
        .map(|p| p.contacts.clone());
    let Some(mine) = world.router_mut(host).as_sim_bet_mut() else {
        return;
    };
    let me = mine.me;
    mine.contacts.entry(me).or_default().insert(peer);
    if let Some(knowledge) = peer_knowledge {
        mine.merge_knowledge(&knowledge);
    }
    mine.refresh_betweenness(peer);
    mine.refresh_betweenness(me);
}

pub(crate) fn update(world: &mut World, host: HostId) {
    if exchange_deliverable_messages(world, host) {
        return;
    }

    let my_utility = match world.router(host).as_sim_bet() {
        // Self-similarity is 1 by the Jaccard definition
        Some(r) => r.utility(r.me, 1.0),
        None => return,
    };

    let msgs = fifo_ids(world, host);
    for conn_id in world.connections_of(host) {
        let Some(conn) = world.connection(conn_id) else {
            continue;
        };
        let peer = conn.peer_of(host);
        let Some(peer_set) = world
            .router(peer)
            .as_sim_bet()
            .map(|p| p.contact_set().clone())
        else {
            continue;
        };
        let peer_utility = match world.router(host).as_sim_bet() {
            Some(mine) => mine.utility(peer, mine.similarity(&peer_set)),
            None => return,
        };
        if peer_utility <= my_utility {
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

    fn make_router(me: usize) -> SimBetRouter {
        let mut router = SimBetRouter::new(SimBetConfig::default());
        router.init(HostId(me));
        router
    }

    #[test]
    fn test_similarity_jaccard() {
        let mut router = make_router(0);
        router.contacts.get_mut(&HostId(0)).unwrap().extend([
            HostId(1),
            HostId(2),
            HostId(3),
        ]);
        let other: BTreeSet<HostId> = [HostId(2), HostId(3), HostId(4)].into();
        // |{2,3}| / |{1,2,3,4}|
        assert!((router.similarity(&other) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_similarity_empty_sets() {
        let router = make_router(0);
        assert_eq!(router.similarity(&BTreeSet::new()), 0.0);
    }

    #[test]
    fn test_betweenness_smoothing() {
        let mut router = make_router(0);
        // Two known hosts list host 5 in their contact sets
        router
            .contacts
            .insert(HostId(1), [HostId(5)].into());
        router
            .contacts
            .insert(HostId(2), [HostId(5)].into());
        router.refresh_betweenness(HostId(5));
        assert!((router.betweenness_of(HostId(5)) - 0.3 * 2.0).abs() < 1e-12);
        router.refresh_betweenness(HostId(5));
        // (1 - β)·0.6 + β·2
        assert!((router.betweenness_of(HostId(5)) - (0.7 * 0.6 + 0.3 * 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_utility_weighs_similarity_and_betweenness() {
        let mut router = make_router(0);
        router.betweenness.insert(HostId(9), 1.0);
        let u = router.utility(HostId(9), 0.5);
        assert!((u - (0.7 * 0.5 + 0.3 * 1.0)).abs() < 1e-12);
    }
}
