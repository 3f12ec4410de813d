//! Bubble Rap routing
//!
//! Social forwarding over community detection and centrality. Messages
//! bubble up the global centrality gradient until they reach the
//! destination's community, then climb the local centrality gradient
//! inside it. One successful transfer start per holder per tick.

use std::collections::BTreeSet;

use crate::connection::TransferResult;
use crate::error::SimResult;
use crate::host::HostId;
use crate::settings::Settings;
use crate::world::World;

use super::centrality::{Centrality, CentralityAlgorithm, CentralityConfig};
use super::community::{CommunityAlgorithm, CommunityConfig, CommunityDetection};
use super::contact::ContactHistory;
use super::{exchange_deliverable_messages, fifo_ids};

#[derive(Debug, Clone)]
pub struct BubbleConfig {
    pub community: CommunityConfig,
    pub centrality: CentralityConfig,
}

impl Default for BubbleConfig {
    fn default() -> Self {
        Self {
            community: CommunityConfig::default(),
            centrality: CentralityConfig::default(),
        }
    }
}

impl BubbleConfig {
    pub fn from_settings(settings: &Settings) -> SimResult<Self> {
        let community_alg = match settings
            .get_or("BubbleRapRouter.communityAlg", "KCliqueCommunityDetection")
        {
            "KCliqueCommunityDetection" => CommunityAlgorithm::KClique,
            "SimpleCommunityDetection" => CommunityAlgorithm::Simple,
            other => {
                return Err(crate::error::SimError::config(
                    "BubbleRapRouter.communityAlg",
                    format!("unknown community algorithm '{other}'"),
                ));
            }
        };
        let centrality_alg =
            match settings.get_or("BubbleRapRouter.centralityAlg", "SWindowCentrality") {
                "SWindowCentrality" => CentralityAlgorithm::SWindow,
                "CWindowCentrality" => CentralityAlgorithm::CWindow,
                other => {
                    return Err(crate::error::SimError::config(
                        "BubbleRapRouter.centralityAlg",
                        format!("unknown centrality algorithm '{other}'"),
                    ));
                }
            };
        Ok(Self {
            community: CommunityConfig::from_settings(settings, community_alg)?,
            centrality: CentralityConfig::from_settings(settings, centrality_alg)?,
        })
    }
}

#[derive(Debug)]
pub struct BubbleRapRouter {
    community: CommunityDetection,
    centrality: Centrality,
    history: ContactHistory,
}

impl BubbleRapRouter {
    pub fn new(config: BubbleConfig) -> Self {
        Self {
            community: CommunityDetection::new(config.community),
            centrality: Centrality::new(config.centrality),
            history: ContactHistory::new(),
        }
    }

    pub(crate) fn init(&mut self, me: HostId) {
        self.community.init(me);
    }

    pub fn local_community(&self) -> &BTreeSet<HostId> {
        self.community.community()
    }

    pub fn familiar_set(&self) -> &BTreeSet<HostId> {
        self.community.familiar()
    }

    pub fn history(&self) -> &ContactHistory {
        &self.history
    }

    pub fn global_centrality(&mut self, now: f64) -> f64 {
        self.centrality.global(&self.history, now)
    }

    pub fn local_centrality(&mut self, now: f64) -> f64 {
        self.centrality
            .local(&self.history, self.community.community(), now)
    }
}

pub(crate) fn changed_connection(world: &mut World, host: HostId, peer: HostId, up: bool) {
    let now = world.clock().time();
    // Peer familiar set, when the peer also runs Bubble Rap; without it
    // only the contact history advances.
    let peer_familiar = world
        .router(peer)
        .as_bubble()
        .map(|b| b.familiar_set().clone());
    let Some(mine) = world.router_mut(host).as_bubble_mut() else {
        return;
    };
    if up {
        mine.history.connection_up(peer, now);
        if let Some(familiar) = &peer_familiar {
            mine.community.connection_up(peer, familiar);
        }
    } else {
        let cumulative = mine.history.connection_down(peer, now);
        if let Some(familiar) = &peer_familiar {
            mine.community.contact_ended(peer, cumulative, familiar);
        }
    }
}

pub(crate) fn update(world: &mut World, host: HostId) {
    if exchange_deliverable_messages(world, host) {
        return;
    }

    let now = world.clock().time();
    let (my_global, my_local, my_community) = match world.router_mut(host).as_bubble_mut() {
        Some(b) => (
            b.global_centrality(now),
            b.local_centrality(now),
            b.local_community().clone(),
        ),
        None => return,
    };

    let msgs = fifo_ids(world, host);
    for conn_id in world.connections_of(host) {
        let Some(conn) = world.connection(conn_id) else {
            continue;
        };
        let peer = conn.peer_of(host);
        // Centrality comparison needs a Bubble Rap peer
        let Some((peer_global, peer_local, peer_community)) =
            world.router_mut(peer).as_bubble_mut().map(|b| {
                (
                    b.global_centrality(now),
                    b.local_centrality(now),
                    b.local_community().clone(),
                )
            })
        else {
            continue;
        };

        for id in &msgs {
            let dest = {
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
                m.to
            };

            let dest_in_mine = my_community.contains(&dest);
            let dest_in_peers = peer_community.contains(&dest);
            let forward = if dest_in_mine {
                // Inside the destination's community: climb local
                // centrality among members
                dest_in_peers && peer_local > my_local
            } else if dest_in_peers {
                // The peer belongs to the destination's community
                true
            } else {
                peer_global > my_global
            };
            if !forward {
                continue;
            }
            match world.start_transfer(conn_id, host, id) {
                TransferResult::RcvOk => return,
                TransferResult::TryLaterBusy => break,
                _ => {}
            }
        }
    }
}
