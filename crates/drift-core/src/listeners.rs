//! Listener traits fired by the world
//!
//! Reports implement these to observe the run; all methods default to
//! no-ops so a report only overrides what it cares about. Listeners fire
//! synchronously within the tick that produced the event.

use crate::error::SimResult;
use crate::host::HostId;
use crate::message::Message;
use crate::world::World;

/// Observes connection state changes
pub trait ConnectionListener {
    fn hosts_connected(&mut self, _a: HostId, _b: HostId, _time: f64) {}
    fn hosts_disconnected(&mut self, _a: HostId, _b: HostId, _time: f64) {}
}

/// Observes message lifecycle events
pub trait MessageListener {
    /// A message was created at its source
    fn new_message(&mut self, _m: &Message) {}
    /// A transfer started on a connection
    fn transfer_started(&mut self, _m: &Message, _from: HostId, _to: HostId, _time: f64) {}
    /// A transfer was aborted because the connection went down
    fn transfer_aborted(&mut self, _m: &Message, _from: HostId, _to: HostId, _time: f64) {}
    /// A transfer completed; `delivered` marks first arrival at the
    /// final destination
    fn message_transferred(
        &mut self,
        _m: &Message,
        _from: HostId,
        _to: HostId,
        _time: f64,
        _delivered: bool,
    ) {
    }
    /// A buffered copy was removed; `dropped` distinguishes eviction and
    /// TTL expiry from deliberate deletes
    fn message_deleted(&mut self, _m: &Message, _host: HostId, _time: f64, _dropped: bool) {}
}

/// Observes the end of each world tick
pub trait UpdateListener {
    fn updated(&mut self, _world: &World) {}
}

/// A report: all three listeners plus an end-of-run flush
pub trait Report: ConnectionListener + MessageListener + UpdateListener + std::fmt::Debug {
    /// Write the report out; called once after the last tick
    fn done(&mut self, world: &World) -> SimResult<()>;
}
