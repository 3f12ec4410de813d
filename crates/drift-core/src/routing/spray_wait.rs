//! Spray-and-Wait routing
//!
//! Every new message starts with `L` copies. While more than one copy
//! remains the holder sprays: in binary mode the receiver gets ⌊L/2⌋ and
//! the sender retains ⌈L/2⌉, in standard mode the receiver gets one copy
//! and the sender retains L−1. A holder down to its last copy waits,
//! forwarding only directly to the destination.

use crate::connection::TransferResult;
use crate::error::SimResult;
use crate::host::HostId;
use crate::message::{Message, Property};
use crate::settings::Settings;
use crate::world::World;

use super::{delete_message, exchange_deliverable_messages, fifo_ids};

/// Message property carrying the remaining copy count
pub const COPIES_PROPERTY: &str = "SprayAndWait.copies";

#[derive(Debug, Clone)]
pub struct SprayAndWaitConfig {
    /// Initial number of copies per message
    pub copies: u32,
    /// Binary (halving) vs standard (one-at-a-time) spraying
    pub binary: bool,
}

impl Default for SprayAndWaitConfig {
    fn default() -> Self {
        Self {
            copies: 6,
            binary: true,
        }
    }
}

impl SprayAndWaitConfig {
    pub fn from_settings(settings: &Settings) -> SimResult<Self> {
        Ok(Self {
            copies: settings.get_u64_or("SprayAndWaitRouter.nrofCopies", 6)? as u32,
            binary: settings.get_bool_or("SprayAndWaitRouter.binaryMode", true)?,
        })
    }
}

#[derive(Debug)]
pub struct SprayAndWaitRouter {
    config: SprayAndWaitConfig,
}

impl SprayAndWaitRouter {
    pub fn new(config: SprayAndWaitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SprayAndWaitConfig {
        &self.config
    }
}

/// Copies a holder retains after handing some to a peer
pub(crate) fn copies_retained(copies: u32, binary: bool) -> u32 {
    if binary {
        copies.div_ceil(2)
    } else {
        copies.saturating_sub(1).max(1)
    }
}

/// Copies the receiving peer ends up holding
pub(crate) fn copies_received(copies: u32, binary: bool) -> u32 {
    if binary { (copies / 2).max(1) } else { 1 }
}

pub(crate) fn init_message(world: &mut World, host: HostId, msg: &mut Message) {
    if let crate::routing::RouterKind::SprayAndWait(r) = world.router(host).kind() {
        msg.set_property(COPIES_PROPERTY, Property::Int(r.config.copies));
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
        for id in &msgs {
            {
                let mine = world.router(host);
                let Some(m) = mine.buffer.get(id) else {
                    continue;
                };
                if m.to == peer {
                    continue;
                }
                // Wait phase: the last copy moves only to the destination
                match m.int_property(COPIES_PROPERTY) {
                    Some(copies) if copies > 1 => {}
                    _ => continue,
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

/// Sender side: halve (or decrement) the retained copies, and consume the
/// local copy entirely after direct delivery
pub(crate) fn transfer_done(world: &mut World, sender: HostId, receiver: HostId, msg_id: &str) {
    let binary = match world.router(sender).kind() {
        crate::routing::RouterKind::SprayAndWait(r) => r.config.binary,
        _ => return,
    };
    let delivered = world
        .router(sender)
        .buffer
        .get(msg_id)
        .map(|m| m.to == receiver)
        .unwrap_or(false);
    if delivered {
        delete_message(world, sender, msg_id, false);
        return;
    }
    if let Some(m) = world.router_mut(sender).buffer.get_mut(msg_id)
        && let Some(copies) = m.int_property(COPIES_PROPERTY)
    {
        m.set_property(
            COPIES_PROPERTY,
            Property::Int(copies_retained(copies, binary)),
        );
    }
}

/// Receiver side: record the share of copies handed over
pub(crate) fn message_received(world: &mut World, receiver: HostId, msg_id: &str) {
    let binary = match world.router(receiver).kind() {
        crate::routing::RouterKind::SprayAndWait(r) => r.config.binary,
        _ => return,
    };
    if let Some(m) = world.router_mut(receiver).buffer.get_mut(msg_id)
        && let Some(copies) = m.int_property(COPIES_PROPERTY)
    {
        m.set_property(
            COPIES_PROPERTY,
            Property::Int(copies_received(copies, binary)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_split_conserves_copies() {
        for copies in 2..=16u32 {
            assert_eq!(
                copies_retained(copies, true) + copies_received(copies, true),
                copies
            );
        }
    }

    #[test]
    fn test_binary_split_values() {
        assert_eq!(copies_retained(6, true), 3);
        assert_eq!(copies_received(6, true), 3);
        assert_eq!(copies_retained(5, true), 3);
        assert_eq!(copies_received(5, true), 2);
        assert_eq!(copies_retained(2, true), 1);
        assert_eq!(copies_received(2, true), 1);
    }

    #[test]
    fn test_standard_mode_hands_one() {
        assert_eq!(copies_received(6, false), 1);
        assert_eq!(copies_retained(6, false), 5);
    }
}
