//! Epidemic routing
//!
//! Flood every buffered message to every peer that lacks it, subject to
//! buffer space and TTL. Maximizes delivery probability in challenged
//! networks at the cost of bandwidth and storage.

use crate::connection::TransferResult;
use crate::host::HostId;
use crate::world::World;

use super::{exchange_deliverable_messages, fifo_ids};

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
                    continue; // deliverables were already attempted
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
    use crate::host::HostId;
    use crate::routing::RouterConfig;
    use crate::world::test_support::{linked_hosts, run};

    #[test]
    fn test_direct_delivery() {
        let (mut world, log) = linked_hosts(2, RouterConfig::Epidemic);
        world.create_message(HostId(0), HostId(1), "m1", 1000).unwrap();
        run(&mut world, 50);
        assert_eq!(log.delivered().len(), 1);
    }

    #[test]
    fn test_relays_through_every_peer() {
        // 0-1-2 in a line; 0 and 2 are out of range of each other
        let (mut world, log) = linked_hosts(3, RouterConfig::Epidemic);
        world.create_message(HostId(0), HostId(2), "m1", 1000).unwrap();
        run(&mut world, 100);
        assert_eq!(log.delivered().len(), 1);
        // host 1 relayed a copy and keeps it
        assert!(world.router(HostId(1)).buffer.has("m1"));
    }
}
