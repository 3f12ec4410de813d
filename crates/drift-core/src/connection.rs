//! Links between interfaces and the transfer state machine

use serde::{Deserialize, Serialize};

use crate::host::HostId;
use crate::message::Message;

/// Identifier of a connection in the world arena
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// One end of a connection: a host and one of its interfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub host: HostId,
    pub iface: usize,
}

/// An in-flight message transfer over a connection
///
/// Carries a snapshot of the message taken at transfer start; the snapshot
/// is what the receiver gets on completion.
#[derive(Debug, Clone)]
pub struct Transfer {
    pub msg: Message,
    pub from: HostId,
    pub bytes_done: f64,
    pub started_at: f64,
}

/// A symmetric link between two interfaces
///
/// Lifecycle: created up and idle when interfaces come into range, carries
/// at most one transfer at a time, and is destroyed when the endpoints
/// leave range. Leaving range mid-transfer aborts the transfer; nothing is
/// delivered and the sender is not charged with a forwarding.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub a: Endpoint,
    pub b: Endpoint,
    pub up: bool,
    /// Transfer speed in bytes/second: the minimum of the endpoint speeds
    pub speed: f64,
    pub transfer: Option<Transfer>,
}

impl Connection {
    pub fn new(id: ConnectionId, a: Endpoint, b: Endpoint, speed: f64) -> Self {
        Self {
            id,
            a,
            b,
            up: true,
            speed,
            transfer: None,
        }
    }

    pub fn involves(&self, host: HostId) -> bool {
        self.a.host == host || self.b.host == host
    }

    /// The opposite endpoint's host
    pub fn peer_of(&self, host: HostId) -> HostId {
        debug_assert!(self.involves(host));
        if self.a.host == host {
            self.b.host
        } else {
            self.a.host
        }
    }

    pub fn endpoints(&self) -> (HostId, HostId) {
        (self.a.host, self.b.host)
    }

    pub fn is_transferring(&self) -> bool {
        self.transfer.is_some()
    }
}

/// Outcome of a transfer or receive attempt
///
/// Denials are local to one forwarding attempt; the caller moves on to the
/// next candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferResult {
    /// Transfer accepted and started
    RcvOk,
    /// Receiver already delivered or already holds this message
    DeniedOld,
    /// Receiver policy refused the message (e.g. hop-path revisit)
    DeniedPolicy,
    /// Connection or receiver busy; worth retrying later
    TryLaterBusy,
    /// Receiver could not make room
    DeniedNoSpace,
    /// Connection is down or otherwise unusable
    DeniedUnreachable,
    /// Message TTL already expired
    DeniedTtlExpired,
}

impl TransferResult {
    pub fn is_ok(self) -> bool {
        self == TransferResult::RcvOk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection() -> Connection {
        Connection::new(
            ConnectionId(7),
            Endpoint {
                host: HostId(1),
                iface: 0,
            },
            Endpoint {
                host: HostId(4),
                iface: 0,
            },
            125_000.0,
        )
    }

    #[test]
    fn test_peer_of() {
        let c = make_connection();
        assert_eq!(c.peer_of(HostId(1)), HostId(4));
        assert_eq!(c.peer_of(HostId(4)), HostId(1));
    }

    #[test]
    fn test_new_connection_is_idle() {
        let c = make_connection();
        assert!(c.up);
        assert!(!c.is_transferring());
    }
}
