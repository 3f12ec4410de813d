//! The simulation world
//!
//! The world owns every arena: hosts (indexed by address), connections,
//! event sources and report listeners. One `update()` advances the
//! simulation by a single tick:
//!
//! 1. queued events inside the window are applied (clock pinned to each
//!    event's timestamp),
//! 2. mobility moves every host,
//! 3. the clock settles on the window end,
//! 4. connectivity changes are detected through the uniform grid,
//! 5. in-flight transfers accrue `Δ × speed` bytes and completions are
//!    delivered (strictly before any router runs),
//! 6. every router updates, in address order or a seeded shuffle.
//!
//! Invariant violations abort the run; everything else is reported to the
//! routers as [`TransferResult`] codes.

use std::collections::{BTreeMap, BTreeSet};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, trace, warn};

use crate::clock::SimClock;
use crate::connection::{Connection, ConnectionId, Endpoint, Transfer, TransferResult};
use crate::coord::Coord;
use crate::error::{SimError, SimResult};
use crate::events::{EventSource, WorldEvent};
use crate::grid::ConnectivityGrid;
use crate::host::{Host, HostId};
use crate::interface::Interface;
use crate::listeners::Report;
use crate::message::Message;
use crate::movement::Movement;
use crate::routing::{self, Router};

/// Engine-level configuration
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Seconds of simulated time per tick
    pub update_interval: f64,
    /// Detect contacts geometrically; off when replaying a trace
    pub simulate_connections: bool,
    /// Shuffle the per-tick host update order (seeded)
    pub randomize_update_order: bool,
    /// Grid cell size as a multiple of the largest transmit range
    pub cell_size_mult: f64,
    /// Top-level seed feeding all sub-generators
    pub seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            update_interval: 0.1,
            simulate_connections: true,
            randomize_update_order: false,
            cell_size_mult: 5.0,
            seed: 0,
        }
    }
}

/// Named random streams derived from the top-level seed
///
/// Keeping the streams separate makes results independent of how often
/// each concern draws, which is what makes runs bit-reproducible.
#[derive(Debug)]
pub(crate) struct SimRngs {
    pub movement: StdRng,
    pub events: StdRng,
    pub routing: StdRng,
    pub order: StdRng,
}

impl SimRngs {
    fn from_seed(seed: u64) -> Self {
        Self {
            movement: StdRng::seed_from_u64(seed),
            events: StdRng::seed_from_u64(seed ^ 0x9e37_79b9_7f4a_7c15),
            routing: StdRng::seed_from_u64(seed ^ 0x6a09_e667_f3bc_c909),
            order: StdRng::seed_from_u64(seed ^ 0xbb67_ae85_84ca_a73b),
        }
    }
}

#[derive(Debug)]
struct Group {
    prefix: String,
    members: Vec<HostId>,
}

#[derive(Debug)]
pub struct World {
    clock: SimClock,
    hosts: Vec<Host>,
    connections: BTreeMap<ConnectionId, Connection>,
    next_connection: u64,
    grid: ConnectivityGrid,
    grid_cell: f64,
    max_range: f64,
    cell_size_mult: f64,
    sources: Vec<EventSource>,
    reports: Vec<Box<dyn Report>>,
    groups: Vec<Group>,
    simulate_connections: bool,
    randomize_update_order: bool,
    pub(crate) rngs: SimRngs,
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            clock: SimClock::new(config.update_interval),
            hosts: Vec::new(),
            connections: BTreeMap::new(),
            next_connection: 0,
            grid: ConnectivityGrid::new(1.0),
            grid_cell: 0.0,
            max_range: 0.0,
            cell_size_mult: config.cell_size_mult,
            sources: Vec::new(),
            reports: Vec::new(),
            groups: Vec::new(),
            simulate_connections: config.simulate_connections,
            randomize_update_order: config.randomize_update_order,
            rngs: SimRngs::from_seed(config.seed),
        }
    }

    // --- construction ---

    /// Add a host to the world
    ///
    /// The address is the next free index; the display name is the group
    /// prefix plus the intra-group index. With no explicit location the
    /// movement model draws one from the movement stream.
    pub fn add_host(
        &mut self,
        group_prefix: &str,
        location: Option<Coord>,
        movement: Movement,
        interfaces: Vec<Interface>,
        mut router: Router,
    ) -> HostId {
        let address = HostId(self.hosts.len());
        let group = match self.groups.iter().position(|g| g.prefix == group_prefix) {
            Some(i) => i,
            None => {
                self.groups.push(Group {
                    prefix: group_prefix.to_string(),
                    members: Vec::new(),
                });
                self.groups.len() - 1
            }
        };
        let name = format!("{}{}", group_prefix, self.groups[group].members.len());
        self.groups[group].members.push(address);

        let location = location
            .or_else(|| movement.initial_location(&mut self.rngs.movement))
            .unwrap_or(Coord::new(0.0, 0.0));
        router.init(address);

        let host = Host::new(address, name, group, location, movement, interfaces, router);
        self.max_range = self.max_range.max(host.max_range());
        self.hosts.push(host);
        address
    }

    pub fn add_event_source(&mut self, source: EventSource) {
        self.sources.push(source);
    }

    pub fn add_report(&mut self, report: Box<dyn Report>) {
        self.reports.push(report);
    }

    /// Advance movement for `seconds` before the simulation starts
    pub fn warmup_movement(&mut self, seconds: f64) {
        if seconds <= 0.0 {
            return;
        }
        let dt = self.clock.step();
        let mut t = -seconds;
        while t < 0.0 {
            let rng = &mut self.rngs.movement;
            for host in &mut self.hosts {
                host.location = host.movement.step(host.location, dt, t, rng);
            }
            t += dt;
        }
    }

    // --- accessors ---

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn host(&self, id: HostId) -> &Host {
        &self.hosts[id.0]
    }

    pub fn host_mut(&mut self, id: HostId) -> &mut Host {
        &mut self.hosts[id.0]
    }

    pub fn router(&self, id: HostId) -> &Router {
        &self.hosts[id.0].router
    }

    pub fn router_mut(&mut self, id: HostId) -> &mut Router {
        &mut self.hosts[id.0].router
    }

    /// Disjoint mutable borrows of two hosts
    pub fn host_pair_mut(&mut self, a: HostId, b: HostId) -> (&mut Host, &mut Host) {
        assert_ne!(a, b, "host_pair_mut needs distinct hosts");
        let (lo, hi) = (a.0.min(b.0), a.0.max(b.0));
        let (left, right) = self.hosts.split_at_mut(hi);
        let (lo_host, hi_host) = (&mut left[lo], &mut right[0]);
        if a.0 < b.0 {
            (lo_host, hi_host)
        } else {
            (hi_host, lo_host)
        }
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn group_prefix(&self, group: usize) -> &str {
        &self.groups[group].prefix
    }

    pub fn group_members(&self, group: usize) -> &[HostId] {
        &self.groups[group].members
    }

    pub(crate) fn routing_rng(&mut self) -> &mut StdRng {
        &mut self.rngs.routing
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// IDs of the connections currently up on any of a host's interfaces
    pub fn connections_of(&self, host: HostId) -> Vec<ConnectionId> {
        self.hosts[host.0]
            .interfaces
            .iter()
            .flat_map(|i| i.connections.iter().copied())
            .collect()
    }

    pub fn find_connection(&self, a: HostId, b: HostId) -> Option<ConnectionId> {
        self.connections
            .values()
            .find(|c| c.involves(a) && c.involves(b))
            .map(|c| c.id)
    }

    /// Whether the host is the sending side of any in-flight transfer
    pub fn is_sending(&self, host: HostId) -> bool {
        self.connections_of(host).iter().any(|id| {
            self.connections
                .get(id)
                .and_then(|c| c.transfer.as_ref())
                .is_some_and(|t| t.from == host)
        })
    }

    /// Whether any of the host's connections carries a transfer
    pub fn is_transferring(&self, host: HostId) -> bool {
        self.connections_of(host)
            .iter()
            .any(|id| self.connections.get(id).is_some_and(|c| c.is_transferring()))
    }

    /// IDs of messages this host is currently sending
    pub fn sending_ids(&self, host: HostId) -> BTreeSet<String> {
        self.connections_of(host)
            .iter()
            .filter_map(|id| self.connections.get(id))
            .filter_map(|c| c.transfer.as_ref())
            .filter(|t| t.from == host)
            .map(|t| t.msg.id.clone())
            .collect()
    }

    /// Create a message at its source host (event sources and tests)
    pub fn create_message(
        &mut self,
        from: HostId,
        to: HostId,
        id: impl Into<String>,
        size: u32,
    ) -> SimResult<bool> {
        routing::create_message(self, from, to, id.into(), size)
    }

    // --- tick loop ---

    /// Run updates until simulated time reaches `end_time`
    pub fn run_until(&mut self, end_time: f64) -> SimResult<()> {
        info!(end_time, hosts = self.hosts.len(), "simulation starting");
        while self.clock.time() < end_time - 1e-9 {
            self.update()?;
        }
        info!(t = self.clock.time(), "simulation finished");
        Ok(())
    }

    /// Flush all reports; call once after the run
    pub fn finalize(&mut self) -> SimResult<()> {
        let mut reports = std::mem::take(&mut self.reports);
        for report in reports.iter_mut() {
            report.done(self)?;
        }
        self.reports = reports;
        Ok(())
    }

    /// Advance the world by one tick
    pub fn update(&mut self) -> SimResult<()> {
        let window_end = self.clock.window_end();
        self.process_events(window_end)?;
        self.move_hosts();
        self.clock.advance();
        if self.simulate_connections {
            self.detect_connectivity();
        }
        self.advance_transfers()?;
        for host in self.update_order() {
            routing::update(self, host);
        }
        self.verify_invariants()?;
        self.fire_updated();
        Ok(())
    }

    fn update_order(&mut self) -> Vec<HostId> {
        let mut order: Vec<HostId> = (0..self.hosts.len()).map(HostId).collect();
        if self.randomize_update_order {
            use rand::seq::SliceRandom;
            order.shuffle(&mut self.rngs.order);
        }
        order
    }

    fn move_hosts(&mut self) {
        let dt = self.clock.step();
        let now = self.clock.time();
        let rng = &mut self.rngs.movement;
        for host in &mut self.hosts {
            host.location = host.movement.step(host.location, dt, now, rng);
        }
    }

    // --- events ---

    fn process_events(&mut self, until: f64) -> SimResult<()> {
        loop {
            let mut best: Option<(f64, usize)> = None;
            for (i, source) in self.sources.iter_mut().enumerate() {
                if let Some(t) = source.next_time(&mut self.rngs.events)
                    && best.is_none_or(|(bt, _)| t < bt)
                {
                    best = Some((t, i));
                }
            }
            let Some((t, i)) = best else { return Ok(()) };
            if t > until {
                return Ok(());
            }
            let Some((t, event)) = self.sources[i].pop(&mut self.rngs.events) else {
                continue;
            };
            self.clock.pin(t);
            self.apply_event(event)?;
        }
    }

    fn apply_event(&mut self, event: WorldEvent) -> SimResult<()> {
        match event {
            WorldEvent::CreateMessage { id, from, to, size } => {
                if from.0 >= self.hosts.len() || to.0 >= self.hosts.len() {
                    warn!(%id, "message event references unknown host, skipped");
                    return Ok(());
                }
                routing::create_message(self, from, to, id, size)?;
            }
            WorldEvent::Connectivity { a, b, up } => {
                if a.0 >= self.hosts.len() || b.0 >= self.hosts.len() {
                    warn!(a = a.0, b = b.0, "connection event references unknown host, skipped");
                    return Ok(());
                }
                if up {
                    self.connect_hosts(a, b);
                } else {
                    self.disconnect_hosts(a, b);
                }
            }
        }
        Ok(())
    }

    // --- connectivity ---

    /// Synthetic contact between the first interfaces of two hosts
    /// (trace replay and scripted scenarios)
    pub fn connect_hosts(&mut self, a: HostId, b: HostId) {
        if a == b || self.find_connection(a, b).is_some() {
            return;
        }
        if self.hosts[a.0].interfaces.is_empty() || self.hosts[b.0].interfaces.is_empty() {
            warn!(a = a.0, b = b.0, "connect event for host without interfaces");
            return;
        }
        self.establish(
            Endpoint { host: a, iface: 0 },
            Endpoint { host: b, iface: 0 },
        );
    }

    pub fn disconnect_hosts(&mut self, a: HostId, b: HostId) {
        if let Some(id) = self.find_connection(a, b) {
            self.tear_down(id);
        }
    }

    fn detect_connectivity(&mut self) {
        // departures first: connections whose endpoints left mutual range
        let stale: Vec<ConnectionId> = self
            .connections
            .values()
            .filter_map(|c| {
                let ha = &self.hosts[c.a.host.0];
                let hb = &self.hosts[c.b.host.0];
                let range = ha.interfaces[c.a.iface]
                    .range
                    .min(hb.interfaces[c.b.iface].range);
                (ha.location.distance(hb.location) > range).then_some(c.id)
            })
            .collect();
        for id in stale {
            self.tear_down(id);
        }

        if self.max_range <= 0.0 {
            return;
        }
        let cell = self.max_range * self.cell_size_mult.max(1.0);
        if (self.grid_cell - cell).abs() > f64::EPSILON {
            self.grid = ConnectivityGrid::new(cell);
            self.grid_cell = cell;
        }
        self.grid
            .rebuild(self.hosts.iter().map(|h| (h.address, h.location)));

        for i in 0..self.hosts.len() {
            let loc = self.hosts[i].location;
            for peer in self.grid.nearby(loc) {
                if peer.0 <= i {
                    continue;
                }
                self.try_link(HostId(i), peer);
            }
        }
    }

    fn try_link(&mut self, a: HostId, b: HostId) {
        let distance = self.hosts[a.0].location.distance(self.hosts[b.0].location);
        for ia in 0..self.hosts[a.0].interfaces.len() {
            for ib in 0..self.hosts[b.0].interfaces.len() {
                if self.linked(a, ia, b, ib) {
                    continue;
                }
                let range = self.hosts[a.0].interfaces[ia]
                    .range
                    .min(self.hosts[b.0].interfaces[ib].range);
                if distance <= range {
                    self.establish(Endpoint { host: a, iface: ia }, Endpoint { host: b, iface: ib });
                }
            }
        }
    }

    fn linked(&self, a: HostId, ia: usize, b: HostId, ib: usize) -> bool {
        let target = Endpoint { host: b, iface: ib };
        self.hosts[a.0].interfaces[ia].connections.iter().any(|id| {
            self.connections
                .get(id)
                .is_some_and(|c| c.a == target || c.b == target)
        })
    }

    fn establish(&mut self, a: Endpoint, b: Endpoint) {
        let speed = self.hosts[a.host.0].interfaces[a.iface]
            .speed
            .min(self.hosts[b.host.0].interfaces[b.iface].speed);
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        self.connections.insert(id, Connection::new(id, a, b, speed));
        self.hosts[a.host.0].interfaces[a.iface].attach(id);
        self.hosts[b.host.0].interfaces[b.iface].attach(id);

        trace!(%id, a = a.host.0, b = b.host.0, t = self.clock.time(), "connection up");
        self.note_hosts_connected(a.host, b.host);
        routing::changed_connection(self, a.host, b.host, true);
        routing::changed_connection(self, b.host, a.host, true);
    }

    fn tear_down(&mut self, id: ConnectionId) {
        let Some(mut conn) = self.connections.remove(&id) else {
            return;
        };
        conn.up = false;
        let (a, b) = conn.endpoints();
        self.hosts[conn.a.host.0].interfaces[conn.a.iface].detach(id);
        self.hosts[conn.b.host.0].interfaces[conn.b.iface].detach(id);

        if let Some(t) = conn.transfer.take() {
            // Abort: nothing is delivered, the sender is not charged
            let receiver = conn.peer_of(t.from);
            if t.msg.to != receiver {
                self.hosts[receiver.0].router.buffer.release(t.msg.size as u64);
            }
            debug!(msg = %t.msg.id, from = t.from.0, to = receiver.0, "transfer aborted");
            self.note_transfer_aborted(&t.msg, t.from, receiver);
        }

        trace!(%id, a = a.0, b = b.0, t = self.clock.time(), "connection down");
        self.note_hosts_disconnected(a, b);
        routing::changed_connection(self, a, b, false);
        routing::changed_connection(self, b, a, false);
    }

    // --- transfers ---

    /// Start sending a buffered message over a connection
    ///
    /// The receiver's admission checks run here; on acceptance the
    /// connection enters the transferring state with a snapshot of the
    /// message.
    pub fn start_transfer(
        &mut self,
        conn_id: ConnectionId,
        sender: HostId,
        msg_id: &str,
    ) -> TransferResult {
        let Some(conn) = self.connections.get(&conn_id) else {
            return TransferResult::DeniedUnreachable;
        };
        if !conn.up {
            return TransferResult::DeniedUnreachable;
        }
        if conn.transfer.is_some() {
            return TransferResult::TryLaterBusy;
        }
        let receiver = conn.peer_of(sender);
        let Some(msg) = self.hosts[sender.0].router.buffer.get(msg_id) else {
            return TransferResult::DeniedUnreachable;
        };
        let msg = msg.clone();

        let result = routing::accept_incoming(self, receiver, &msg);
        if result != TransferResult::RcvOk {
            trace!(msg = %msg.id, to = receiver.0, ?result, "transfer refused");
            return result;
        }

        let now = self.clock.time();
        let Some(conn) = self.connections.get_mut(&conn_id) else {
            if msg.to != receiver {
                self.hosts[receiver.0].router.buffer.release(msg.size as u64);
            }
            return TransferResult::DeniedUnreachable;
        };
        conn.transfer = Some(Transfer {
            msg: msg.clone(),
            from: sender,
            bytes_done: 0.0,
            started_at: now,
        });
        trace!(msg = %msg.id, from = sender.0, to = receiver.0, t = now, "transfer started");
        self.note_transfer_started(&msg, sender, receiver);
        TransferResult::RcvOk
    }

    fn advance_transfers(&mut self) -> SimResult<()> {
        let dt = self.clock.step();
        let ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        for id in ids {
            let finished = {
                let Some(conn) = self.connections.get_mut(&id) else {
                    continue;
                };
                let Some(t) = conn.transfer.as_mut() else {
                    continue;
                };
                t.bytes_done += dt * conn.speed;
                t.bytes_done + 1e-6 >= t.msg.size as f64
            };
            if finished {
                let Some(conn) = self.connections.get_mut(&id) else {
                    continue;
                };
                let Some(t) = conn.transfer.take() else {
                    continue;
                };
                let receiver = conn.peer_of(t.from);
                self.complete_transfer(t, receiver)?;
            }
        }
        Ok(())
    }

    fn complete_transfer(&mut self, transfer: Transfer, receiver: HostId) -> SimResult<()> {
        let now = self.clock.time();
        let sender = transfer.from;
        let mut msg = transfer.msg;

        if msg.to == receiver {
            // Final delivery, idempotent per message ID
            let first = self.hosts[receiver.0].router.mark_delivered(&msg.id);
            if first {
                msg.receive_time = now;
                msg.record_hop(receiver);
                debug!(msg = %msg.id, to = receiver.0, t = now, "delivered");
                self.note_message_transferred(&msg, sender, receiver, true);
            } else {
                trace!(msg = %msg.id, to = receiver.0, "duplicate delivery ignored");
            }
        } else {
            self.hosts[receiver.0].router.buffer.release(msg.size as u64);
            msg.receive_time = now;
            msg.record_hop(receiver);
            self.hosts[receiver.0].router.buffer.insert(msg.clone())?;
            routing::message_received(self, receiver, &msg.id, sender);
            self.note_message_transferred(&msg, sender, receiver, false);
        }
        routing::transfer_done(self, sender, receiver, &msg.id);
        Ok(())
    }

    // --- invariants ---

    fn verify_invariants(&self) -> SimResult<()> {
        for host in &self.hosts {
            let buffer = &host.router.buffer;
            if buffer.occupancy() > buffer.capacity() {
                return Err(SimError::Invariant(format!(
                    "host {} buffer over capacity: {} > {}",
                    host.name,
                    buffer.occupancy(),
                    buffer.capacity()
                )));
            }
        }
        for conn in self.connections.values() {
            let listed = |e: Endpoint| {
                self.hosts[e.host.0].interfaces[e.iface]
                    .connections
                    .contains(&conn.id)
            };
            if !listed(conn.a) || !listed(conn.b) {
                return Err(SimError::Invariant(format!(
                    "asymmetric connection state for {}",
                    conn.id
                )));
            }
            if let Some(t) = &conn.transfer
                && !(t.bytes_done.is_finite() && t.bytes_done >= 0.0)
            {
                return Err(SimError::Invariant(format!(
                    "connection {} has invalid transfer progress {}",
                    conn.id, t.bytes_done
                )));
            }
        }
        Ok(())
    }

    // --- listener firing ---

    pub(crate) fn note_new_message(&mut self, m: &Message) {
        for r in self.reports.iter_mut() {
            r.new_message(m);
        }
    }

    pub(crate) fn note_transfer_started(&mut self, m: &Message, from: HostId, to: HostId) {
        let time = self.clock.time();
        for r in self.reports.iter_mut() {
            r.transfer_started(m, from, to, time);
        }
    }

    pub(crate) fn note_transfer_aborted(&mut self, m: &Message, from: HostId, to: HostId) {
        let time = self.clock.time();
        for r in self.reports.iter_mut() {
            r.transfer_aborted(m, from, to, time);
        }
    }

    pub(crate) fn note_message_transferred(
        &mut self,
        m: &Message,
        from: HostId,
        to: HostId,
        delivered: bool,
    ) {
        let time = self.clock.time();
        for r in self.reports.iter_mut() {
            r.message_transferred(m, from, to, time, delivered);
        }
    }

    pub(crate) fn note_message_deleted(&mut self, m: &Message, host: HostId, dropped: bool) {
        let time = self.clock.time();
        for r in self.reports.iter_mut() {
            r.message_deleted(m, host, time, dropped);
        }
    }

    fn note_hosts_connected(&mut self, a: HostId, b: HostId) {
        let time = self.clock.time();
        for r in self.reports.iter_mut() {
            r.hosts_connected(a, b, time);
        }
    }

    fn note_hosts_disconnected(&mut self, a: HostId, b: HostId) {
        let time = self.clock.time();
        for r in self.reports.iter_mut() {
            r.hosts_disconnected(a, b, time);
        }
    }

    fn fire_updated(&mut self) {
        let mut reports = std::mem::take(&mut self.reports);
        for r in reports.iter_mut() {
            r.updated(self);
        }
        self.reports = reports;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::listeners::{ConnectionListener, MessageListener, UpdateListener};
    use crate::routing::RouterConfig;

    #[derive(Debug, Default)]
    pub struct LogData {
        pub created: Vec<String>,
        pub delivered: Vec<(String, f64)>,
        pub relayed: Vec<(String, HostId, HostId)>,
        pub dropped: Vec<(String, HostId)>,
        pub aborted: Vec<String>,
    }

    #[derive(Debug, Clone, Default)]
    pub struct LogHandle(Rc<RefCell<LogData>>);

    impl LogHandle {
        pub fn created(&self) -> Vec<String> {
            self.0.borrow().created.clone()
        }

        pub fn delivered(&self) -> Vec<(String, f64)> {
            self.0.borrow().delivered.clone()
        }

        pub fn relayed(&self) -> Vec<(String, HostId, HostId)> {
            self.0.borrow().relayed.clone()
        }

        pub fn dropped(&self) -> Vec<(String, HostId)> {
            self.0.borrow().dropped.clone()
        }

        pub fn aborted(&self) -> Vec<String> {
            self.0.borrow().aborted.clone()
        }
    }

    #[derive(Debug)]
    struct TestLog(LogHandle);

    impl MessageListener for TestLog {
        fn new_message(&mut self, m: &Message) {
            self.0.0.borrow_mut().created.push(m.id.clone());
        }

        fn transfer_aborted(&mut self, m: &Message, _from: HostId, _to: HostId, _time: f64) {
            self.0.0.borrow_mut().aborted.push(m.id.clone());
        }

        fn message_transferred(
            &mut self,
            m: &Message,
            from: HostId,
            to: HostId,
            time: f64,
            delivered: bool,
        ) {
            if delivered {
                self.0.0.borrow_mut().delivered.push((m.id.clone(), time));
            } else {
                self.0.0.borrow_mut().relayed.push((m.id.clone(), from, to));
            }
        }

        fn message_deleted(&mut self, m: &Message, host: HostId, _time: f64, dropped: bool) {
            if dropped {
                self.0.0.borrow_mut().dropped.push((m.id.clone(), host));
            }
        }
    }

    impl ConnectionListener for TestLog {}
    impl UpdateListener for TestLog {}

    impl Report for TestLog {
        fn done(&mut self, _world: &World) -> SimResult<()> {
            Ok(())
        }
    }

    pub fn attach_log(world: &mut World) -> LogHandle {
        let handle = LogHandle::default();
        world.add_report(Box::new(TestLog(handle.clone())));
        handle
    }

    /// `n` stationary hosts on a line, adjacent pairs in mutual range
    pub fn linked_hosts(n: usize, config: RouterConfig) -> (World, LogHandle) {
        let mut world = World::new(WorldConfig::default());
        for i in 0..n {
            world.add_host(
                "h",
                Some(Coord::new(15.0 * i as f64, 0.0)),
                Movement::Stationary,
                vec![Interface::new(20.0, 100_000.0)],
                Router::new(&config, 10_000_000, None),
            );
        }
        let log = attach_log(&mut world);
        (world, log)
    }

    pub fn run(world: &mut World, ticks: usize) {
        for _ in 0..ticks {
            world.update().expect("tick failed");
        }
    }

    #[test]
    fn test_grid_discovers_adjacent_pairs_only() {
        let (mut world, _log) = linked_hosts(3, RouterConfig::Epidemic);
        run(&mut world, 1);
        assert!(world.find_connection(HostId(0), HostId(1)).is_some());
        assert!(world.find_connection(HostId(1), HostId(2)).is_some());
        assert!(world.find_connection(HostId(0), HostId(2)).is_none());
    }

    #[test]
    fn test_connection_symmetry() {
        let (mut world, _log) = linked_hosts(2, RouterConfig::Epidemic);
        run(&mut world, 1);
        let id = world.find_connection(HostId(0), HostId(1)).unwrap();
        for h in [HostId(0), HostId(1)] {
            assert!(world.connections_of(h).contains(&id));
        }
    }

    #[test]
    fn test_disconnect_aborts_transfer() {
        let (mut world, log) = linked_hosts(2, RouterConfig::Epidemic);
        // Big message so the transfer spans many ticks
        world
            .create_message(HostId(0), HostId(1), "slow", 5_000_000)
            .unwrap();
        run(&mut world, 5);
        assert!(world.is_transferring(HostId(0)));

        // Walk host 1 out of range
        world.host_mut(HostId(1)).location = Coord::new(500.0, 0.0);
        run(&mut world, 1);
        assert_eq!(log.aborted(), vec!["slow".to_string()]);
        assert!(log.delivered().is_empty());
        // Reservation was released
        assert_eq!(world.router(HostId(1)).buffer.free(), 10_000_000);
    }

    #[test]
    fn test_update_order_shuffle_is_seeded() {
        let order = |seed| {
            let mut world = World::new(WorldConfig {
                randomize_update_order: true,
                seed,
                ..Default::default()
            });
            for _ in 0..8 {
                world.add_host(
                    "n",
                    Some(Coord::new(0.0, 0.0)),
                    Movement::Stationary,
                    vec![],
                    Router::new(&RouterConfig::Epidemic, 1_000, None),
                );
            }
            world.update_order()
        };
        assert_eq!(order(42), order(42));
        assert_ne!(order(42), order(43));
    }
}
