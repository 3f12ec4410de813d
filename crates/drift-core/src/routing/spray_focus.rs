//! Spray-and-Focus routing
//!
//! The spray phase is binary Spray-and-Wait. Once a holder is down to a
//! single copy it enters the focus phase: the copy is handed to a peer
//! that has seen the destination more recently than the holder, and the
//! local copy is deleted after a successful handoff.

use std::collections::BTreeMap;

use crate::connection::TransferResult;
use crate::error::SimResult;
use crate::host::HostId;
use crate::message::{Message, Property};
use crate::settings::Settings;
use crate::world::World;

use super::spray_wait::{copies_received, copies_retained};
use super::{delete_message, exchange_deliverable_messages, fifo_ids};

/// Message property carrying the remaining copy count
pub const COPIES_PROPERTY: &str = "SprayAndFocus.copies";

#[derive(Debug, Clone)]
pub struct SprayAndFocusConfig {
    /// Initial number of copies per message
    pub copies: u32,
}

impl Default for SprayAndFocusConfig {
    fn default() -> Self {
        Self { copies: 6 }
    }
}

impl SprayAndFocusConfig {
    pub fn from_settings(settings: &Settings) -> SimResult<Self> {
        Ok(Self {
            copies: settings.get_u64_or("SprayAndFocusRouter.nrofCopies", 6)? as u32,
        })
    }
}

#[derive(Debug)]
pub struct SprayAndFocusRouter {
    config: SprayAndFocusConfig,
    /// Most recent contact time per peer
    encounter_times: BTreeMap<HostId, f64>,
}

impl SprayAndFocusRouter {
    pub fn new(config: SprayAndFocusConfig) -> Self {
        Self {
            config,
            encounter_times: BTreeMap::new(),
        }
    }

    pub fn last_encounter(&self, host: HostId) -> Option<f64> {
        self.encounter_times.get(&host).copied()
    }

    fn note_encounter(&mut self, host: HostId, time: f64) {
        self.encounter_times.insert(host, time);
    }
}

pub(crate) fn init_message(world: &mut World, host: HostId, msg: &mut Message) {
    if let crate::routing::RouterKind::SprayAndFocus(r) = world.router(host).kind() {
        msg.set_property(COPIES_PROPERTY, Property::Int(r.config.copies));
    }
}

pub(crate) fn changed_connection(world: &mut World, host: HostId, peer: HostId, up: bool) {
    if !up {
        return;
    }
    let now = world.clock().time();
    if let Some(r) = world.router_mut(host).as_spray_focus_mut() {
        r.note_encounter(peer, now);
    }
}

pub(crate) fn update(world: &mut World, host: HostId) {
    if exchange_deliverable_messages(world, host) {
        return;
    }

    let msgs = fifo_ids(world, host);
    for conn_id in world.connections_of(host) {
        let Some(conn) = world.connection(conn_id) else {
            continue;
        };
        let peer = conn.peer_of(host);
        if world.is_transferring(peer) {
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
                let Some(copies) = m.int_property(COPIES_PROPERTY) else {
                    continue;
                };
                let theirs = world.router(peer);
                if theirs.buffer.has(id) || theirs.is_delivered(id) {
                    continue;
                }
                if copies <= 1 {
                    // Focus phase: hand off only to a peer with a more
                    // recent encounter of the destination
                    let Some(peer_router) = theirs.as_spray_focus() else {
                        continue;
                    };
                    let Some(peer_seen) = peer_router.last_encounter(m.to) else {
                        continue;
                    };
                    let my_seen = mine
                        .as_spray_focus()
                        .and_then(|r| r.last_encounter(m.to));
                    if let Some(mine_seen) = my_seen
                        && peer_seen <= mine_seen
                    {
                        continue;
                    }
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

/// Sender side: halve copies in the spray phase, drop the local copy after
/// a focus handoff
pub(crate) fn transfer_done(world: &mut World, sender: HostId, receiver: HostId, msg_id: &str) {
    let Some(m) = world.router(sender).buffer.get(msg_id) else {
        return;
    };
    if m.to == receiver {
        // Delivered; the copy stays until TTL or eviction removes it
        return;
    }
    let Some(copies) = m.int_property(COPIES_PROPERTY) else {
        return;
    };
    if copies > 1 {
        let retained = copies_retained(copies, true);
        if let Some(m) = world.router_mut(sender).buffer.get_mut(msg_id) {
            m.set_property(COPIES_PROPERTY, Property::Int(retained));
        }
    } else {
        delete_message(world, sender, msg_id, false);
    }
}

/// Receiver side: record the handed-over copy share and refresh the
/// encounter time of the sender
pub(crate) fn message_received(world: &mut World, receiver: HostId, msg_id: &str, from: HostId) {
    let now = world.clock().time();
    if let Some(r) = world.router_mut(receiver).as_spray_focus_mut() {
        r.note_encounter(from, now);
    }
    if let Some(m) = world.router_mut(receiver).buffer.get_mut(msg_id)
        && let Some(copies) = m.int_property(COPIES_PROPERTY)
    {
        m.set_property(COPIES_PROPERTY, Property::Int(copies_received(copies, true)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encounter_bookkeeping() {
        let mut router = SprayAndFocusRouter::new(SprayAndFocusConfig::default());
        assert_eq!(router.last_encounter(HostId(3)), None);
        router.note_encounter(HostId(3), 12.0);
        router.note_encounter(HostId(3), 40.0);
        assert_eq!(router.last_encounter(HostId(3)), Some(40.0));
    }

    #[test]
    fn test_focus_handoff_keeps_one_copy() {
        // A focus handoff arrives with copies = 1 and must stay at 1
        assert_eq!(copies_received(1, true), 1);
    }
}
