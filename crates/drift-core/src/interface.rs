//! Radio interfaces

use crate::connection::ConnectionId;

/// A radio on a host: transmit range, transmit speed, live connections
///
/// Two interfaces may connect iff they belong to distinct hosts and the
/// hosts are within the minimum of the two transmit ranges. Connection
/// membership is symmetric: both endpoints list the same connection ID.
#[derive(Debug, Clone)]
pub struct Interface {
    /// Transmit range in meters
    pub range: f64,
    /// Transmit speed in bytes per second
    pub speed: f64,
    /// Connections currently up on this interface
    pub connections: Vec<ConnectionId>,
}

impl Interface {
    pub fn new(range: f64, speed: f64) -> Self {
        Self {
            range,
            speed,
            connections: Vec::new(),
        }
    }

    pub(crate) fn attach(&mut self, id: ConnectionId) {
        debug_assert!(!self.connections.contains(&id));
        self.connections.push(id);
    }

    pub(crate) fn detach(&mut self, id: ConnectionId) {
        self.connections.retain(|&c| c != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_detach() {
        let mut iface = Interface::new(10.0, 250_000.0);
        iface.attach(ConnectionId(1));
        iface.attach(ConnectionId(2));
        iface.detach(ConnectionId(1));
        assert_eq!(iface.connections, vec![ConnectionId(2)]);
    }
}
