//! Message routers
//!
//! Every host owns a [`Router`]: the bounded message buffer, the set of
//! delivered message IDs, and a strategy-specific state variant. Strategies
//! are tagged variants dispatched by free functions rather than an
//! inheritance tree; shared behavior (FIFO ordering, TTL sweep, drop
//! policy, deliverables-first exchange) lives here and takes the router
//! state through the world handle.
//!
//! Routers never raise errors: forwarding attempts yield
//! [`TransferResult`] codes and the caller moves on to the next candidate.
//! Cross-host reads go through the world arena and a match on the peer's
//! variant; a peer of an incompatible variant is skipped for state
//! exchange but can still receive plain message transfers.

pub mod bubble;
pub mod centrality;
pub mod community;
pub mod contact;
pub mod epidemic;
pub mod people_rank;
pub mod prophet;
pub mod sim_bet;
pub mod spray_focus;
pub mod spray_wait;

use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::buffer::MessageBuffer;
use crate::connection::TransferResult;
use crate::error::{SimError, SimResult};
use crate::host::HostId;
use crate::message::Message;
use crate::settings::Settings;
use crate::world::World;

pub use bubble::{BubbleConfig, BubbleRapRouter};
pub use centrality::{Centrality, CentralityAlgorithm, CentralityConfig};
pub use community::{CommunityAlgorithm, CommunityConfig, CommunityDetection};
pub use contact::ContactHistory;
pub use people_rank::{PeopleRankConfig, PeopleRankRouter};
pub use prophet::{
    ForwardingStrategy, ProphetConfig, ProphetMode, ProphetRouter, QueueingPolicy,
};
pub use sim_bet::{SimBetConfig, SimBetRouter};
pub use spray_focus::{SprayAndFocusConfig, SprayAndFocusRouter};
pub use spray_wait::{SprayAndWaitConfig, SprayAndWaitRouter};

/// Configuration selecting and parameterizing a routing strategy
#[derive(Debug, Clone)]
pub enum RouterConfig {
    Epidemic,
    SprayAndWait(SprayAndWaitConfig),
    SprayAndFocus(SprayAndFocusConfig),
    Prophet(ProphetConfig),
    BubbleRap(BubbleConfig),
    PeopleRank(PeopleRankConfig),
    SimBet(SimBetConfig),
}

impl RouterConfig {
    /// Resolve a router class name from a scenario file
    ///
    /// Router-specific parameters come from their own namespaces
    /// (`ProphetRouter.*`, `CommunityDetection.*`, ...).
    pub fn from_settings(name: &str, settings: &Settings) -> SimResult<Self> {
        match name {
            "EpidemicRouter" => Ok(RouterConfig::Epidemic),
            "SprayAndWaitRouter" => Ok(RouterConfig::SprayAndWait(
                SprayAndWaitConfig::from_settings(settings)?,
            )),
            "SprayAndFocusRouter" => Ok(RouterConfig::SprayAndFocus(
                SprayAndFocusConfig::from_settings(settings)?,
            )),
            "ProphetRouter" => Ok(RouterConfig::Prophet(ProphetConfig::from_settings(
                settings,
                ProphetMode::Standard,
                false,
            )?)),
            "ProphetV3Router" => Ok(RouterConfig::Prophet(ProphetConfig::from_settings(
                settings,
                ProphetMode::Standard,
                true,
            )?)),
            "ProphetPrepRouter" => Ok(RouterConfig::Prophet(ProphetConfig::from_settings(
                settings,
                ProphetMode::Prep,
                false,
            )?)),
            "RandomProphetRouter" => Ok(RouterConfig::Prophet(ProphetConfig::from_settings(
                settings,
                ProphetMode::Random,
                false,
            )?)),
            "BubbleRapRouter" => Ok(RouterConfig::BubbleRap(BubbleConfig::from_settings(
                settings,
            )?)),
            "PeopleRankRouter" => Ok(RouterConfig::PeopleRank(
                PeopleRankConfig::from_settings(settings)?,
            )),
            "SimBetRouter" => Ok(RouterConfig::SimBet(SimBetConfig::from_settings(
                settings,
            )?)),
            other => Err(SimError::config(
                "router",
                format!("unknown router class '{other}'"),
            )),
        }
    }
}

/// Strategy-specific router state
#[derive(Debug)]
pub enum RouterKind {
    Epidemic,
    SprayAndWait(SprayAndWaitRouter),
    SprayAndFocus(SprayAndFocusRouter),
    Prophet(ProphetRouter),
    BubbleRap(BubbleRapRouter),
    PeopleRank(PeopleRankRouter),
    SimBet(SimBetRouter),
}

/// Discriminant of [`RouterKind`], used to dispatch without borrowing the
/// router state across the call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterTag {
    Epidemic,
    SprayAndWait,
    SprayAndFocus,
    Prophet,
    BubbleRap,
    PeopleRank,
    SimBet,
}

/// Per-host router: buffer, delivered set, strategy state
#[derive(Debug)]
pub struct Router {
    pub buffer: MessageBuffer,
    /// IDs of messages already delivered to this host as destination
    delivered: BTreeSet<String>,
    /// TTL in minutes assigned to messages created at this host
    ttl: Option<f64>,
    kind: RouterKind,
}

impl Router {
    /// Instantiate a router for one host from shared group configuration
    pub fn new(config: &RouterConfig, buffer_size: u64, ttl: Option<f64>) -> Self {
        let kind = match config {
            RouterConfig::Epidemic => RouterKind::Epidemic,
            RouterConfig::SprayAndWait(c) => {
                RouterKind::SprayAndWait(SprayAndWaitRouter::new(c.clone()))
            }
            RouterConfig::SprayAndFocus(c) => {
                RouterKind::SprayAndFocus(SprayAndFocusRouter::new(c.clone()))
            }
            RouterConfig::Prophet(c) => RouterKind::Prophet(ProphetRouter::new(c.clone())),
            RouterConfig::BubbleRap(c) => RouterKind::BubbleRap(BubbleRapRouter::new(c.clone())),
            RouterConfig::PeopleRank(c) => {
                RouterKind::PeopleRank(PeopleRankRouter::new(c.clone()))
            }
            RouterConfig::SimBet(c) => RouterKind::SimBet(SimBetRouter::new(c.clone())),
        };
        Self {
            buffer: MessageBuffer::new(buffer_size),
            delivered: BTreeSet::new(),
            ttl,
            kind,
        }
    }

    /// Bind the router to its owning host's address
    ///
    /// Called by the world when the host is added; strategies that track
    /// their own identity (community membership, contact sets) capture it
    /// here.
    pub(crate) fn init(&mut self, me: HostId) {
        match &mut self.kind {
            RouterKind::BubbleRap(b) => b.init(me),
            RouterKind::SimBet(s) => s.init(me),
            _ => {}
        }
    }

    pub fn kind(&self) -> &RouterKind {
        &self.kind
    }

    pub fn tag(&self) -> RouterTag {
        match &self.kind {
            RouterKind::Epidemic => RouterTag::Epidemic,
            RouterKind::SprayAndWait(_) => RouterTag::SprayAndWait,
            RouterKind::SprayAndFocus(_) => RouterTag::SprayAndFocus,
            RouterKind::Prophet(_) => RouterTag::Prophet,
            RouterKind::BubbleRap(_) => RouterTag::BubbleRap,
            RouterKind::PeopleRank(_) => RouterTag::PeopleRank,
            RouterKind::SimBet(_) => RouterTag::SimBet,
        }
    }

    pub fn is_delivered(&self, id: &str) -> bool {
        self.delivered.contains(id)
    }

    pub(crate) fn mark_delivered(&mut self, id: &str) -> bool {
        self.delivered.insert(id.to_string())
    }

    pub fn as_prophet(&self) -> Option<&ProphetRouter> {
        match &self.kind {
            RouterKind::Prophet(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_prophet_mut(&mut self) -> Option<&mut ProphetRouter> {
        match &mut self.kind {
            RouterKind::Prophet(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_bubble(&self) -> Option<&BubbleRapRouter> {
        match &self.kind {
            RouterKind::BubbleRap(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bubble_mut(&mut self) -> Option<&mut BubbleRapRouter> {
        match &mut self.kind {
            RouterKind::BubbleRap(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_spray_focus(&self) -> Option<&SprayAndFocusRouter> {
        match &self.kind {
            RouterKind::SprayAndFocus(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_spray_focus_mut(&mut self) -> Option<&mut SprayAndFocusRouter> {
        match &mut self.kind {
            RouterKind::SprayAndFocus(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_people_rank(&self) -> Option<&PeopleRankRouter> {
        match &self.kind {
            RouterKind::PeopleRank(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_people_rank_mut(&mut self) -> Option<&mut PeopleRankRouter> {
        match &mut self.kind {
            RouterKind::PeopleRank(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_sim_bet(&self) -> Option<&SimBetRouter> {
        match &self.kind {
            RouterKind::SimBet(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sim_bet_mut(&mut self) -> Option<&mut SimBetRouter> {
        match &mut self.kind {
            RouterKind::SimBet(s) => Some(s),
            _ => None,
        }
    }
}

/// One router update: TTL sweep, then strategy-specific forwarding
pub fn update(world: &mut World, host: HostId) {
    drop_expired(world, host);

    // One outgoing transfer at a time per host
    if world.is_sending(host) {
        return;
    }
    if world.router(host).buffer.is_empty() || world.connections_of(host).is_empty() {
        return;
    }

    match world.router(host).tag() {
        RouterTag::Epidemic => epidemic::update(world, host),
        RouterTag::SprayAndWait => spray_wait::update(world, host),
        RouterTag::SprayAndFocus => spray_focus::update(world, host),
        RouterTag::Prophet => prophet::update(world, host),
        RouterTag::BubbleRap => bubble::update(world, host),
        RouterTag::PeopleRank => people_rank::update(world, host),
        RouterTag::SimBet => sim_bet::update(world, host),
    }
}

/// Connection state change notification, fired for both endpoints
pub fn changed_connection(world: &mut World, host: HostId, peer: HostId, up: bool) {
    match world.router(host).tag() {
        RouterTag::Prophet => prophet::changed_connection(world, host, peer, up),
        RouterTag::BubbleRap => bubble::changed_connection(world, host, peer, up),
        RouterTag::SprayAndFocus => spray_focus::changed_connection(world, host, peer, up),
        RouterTag::PeopleRank => people_rank::changed_connection(world, host, peer, up),
        RouterTag::SimBet => sim_bet::changed_connection(world, host, peer, up),
        RouterTag::Epidemic | RouterTag::SprayAndWait => {}
    }
}

/// Sender-side hook after a transfer completed
pub(crate) fn transfer_done(world: &mut World, sender: HostId, receiver: HostId, msg_id: &str) {
    match world.router(sender).tag() {
        RouterTag::SprayAndWait => spray_wait::transfer_done(world, sender, receiver, msg_id),
        RouterTag::SprayAndFocus => spray_focus::transfer_done(world, sender, receiver, msg_id),
        RouterTag::Prophet => prophet::transfer_done(world, sender, receiver, msg_id),
        _ => {}
    }
}

/// Receiver-side hook after a relayed copy was committed to the buffer
pub(crate) fn message_received(world: &mut World, receiver: HostId, msg_id: &str, from: HostId) {
    match world.router(receiver).tag() {
        RouterTag::SprayAndWait => spray_wait::message_received(world, receiver, msg_id),
        RouterTag::SprayAndFocus => spray_focus::message_received(world, receiver, msg_id, from),
        RouterTag::Prophet => prophet::message_received(world, receiver, msg_id),
        _ => {}
    }
}

/// Create a new message at its source host
///
/// Assigns the group TTL, makes room (new messages may evict old ones),
/// applies the strategy's new-message hook and fires listeners. Returns
/// `Ok(false)` when the message cannot fit even after eviction.
pub fn create_message(
    world: &mut World,
    from: HostId,
    to: HostId,
    id: String,
    size: u32,
) -> SimResult<bool> {
    let now = world.clock().time();
    let router = world.router(from);
    let ttl = router.ttl;

    if size as u64 > router.buffer.capacity() {
        debug!(%id, size, "message larger than source buffer, not created");
        return Ok(false);
    }
    if !make_room(world, from, size as u64) {
        debug!(%id, size, "no room for new message at source");
        return Ok(false);
    }

    let mut msg = Message::new(id, from, to, size, now);
    if let Some(minutes) = ttl {
        msg = msg.with_ttl(minutes);
    }
    new_message_hook(world, from, &mut msg);
    world.router_mut(from).buffer.insert(msg.clone())?;
    world.note_new_message(&msg);
    trace!(msg = %msg, t = now, "message created");
    Ok(true)
}

fn new_message_hook(world: &mut World, host: HostId, msg: &mut Message) {
    match world.router(host).tag() {
        RouterTag::SprayAndWait => spray_wait::init_message(world, host, msg),
        RouterTag::SprayAndFocus => spray_focus::init_message(world, host, msg),
        _ => {}
    }
}

/// Receiver-side admission check for an incoming transfer
///
/// Applies the duplicate/TTL/policy checks and, for relays, evicts victims
/// per the drop policy and reserves space for the incoming copy.
pub(crate) fn accept_incoming(
    world: &mut World,
    receiver: HostId,
    msg: &Message,
) -> TransferResult {
    let now = world.clock().time();
    let router = world.router(receiver);

    if router.is_delivered(&msg.id) || router.buffer.has(&msg.id) {
        return TransferResult::DeniedOld;
    }
    if msg.is_expired(now) {
        return TransferResult::DeniedTtlExpired;
    }
    if msg.was_carried_by(receiver) {
        // Revisits would put the host into the hop path twice
        return TransferResult::DeniedPolicy;
    }
    if msg.to == receiver {
        // Final delivery is consumed on completion, not buffered
        return TransferResult::RcvOk;
    }
    if msg.size as u64 > router.buffer.capacity() {
        return TransferResult::DeniedNoSpace;
    }
    if !make_room(world, receiver, msg.size as u64) {
        return TransferResult::DeniedNoSpace;
    }
    world.router_mut(receiver).buffer.reserve(msg.size as u64);
    TransferResult::RcvOk
}

/// Evict buffered messages until `bytes` fit, never evicting a copy that
/// is currently being sent
pub(crate) fn make_room(world: &mut World, host: HostId, bytes: u64) -> bool {
    while world.router(host).buffer.free() < bytes {
        let Some(victim) = next_message_to_remove(world, host, true) else {
            return false;
        };
        delete_message(world, host, &victim, true);
    }
    true
}

/// Pick the next drop victim per the router's queueing policy
///
/// The default policy is FIFO by receive time; the PRoPHET family
/// substitutes its configured policy. Ties break by oldest receive time.
pub(crate) fn next_message_to_remove(
    world: &World,
    host: HostId,
    exclude_sending: bool,
) -> Option<String> {
    let sending = if exclude_sending {
        world.sending_ids(host)
    } else {
        BTreeSet::new()
    };
    let router = world.router(host);
    let candidates: Vec<&Message> = router
        .buffer
        .iter()
        .filter(|m| !sending.contains(&m.id))
        .collect();

    if let RouterKind::Prophet(p) = &router.kind {
        return prophet::next_message_to_remove(p, &candidates, world.clock().time());
    }

    candidates
        .into_iter()
        .min_by(|a, b| a.receive_time.total_cmp(&b.receive_time))
        .map(|m| m.id.clone())
}

/// Remove a buffered copy, with strategy cleanup and listener firing
pub(crate) fn delete_message(world: &mut World, host: HostId, id: &str, dropped: bool) {
    let Some(msg) = world.router_mut(host).buffer.remove(id) else {
        return;
    };
    if let RouterKind::Prophet(p) = &mut world.router_mut(host).kind {
        p.forget_message(id);
    }
    world.note_message_deleted(&msg, host, dropped);
}

/// Drop every buffered message whose TTL has run out
fn drop_expired(world: &mut World, host: HostId) {
    let now = world.clock().time();
    let sending = world.sending_ids(host);
    let expired: Vec<String> = world
        .router(host)
        .buffer
        .iter()
        .filter(|m| m.is_expired(now) && !sending.contains(&m.id))
        .map(|m| m.id.clone())
        .collect();
    for id in expired {
        trace!(%id, host = %host, "TTL expired");
        delete_message(world, host, &id, true);
    }
}

/// Try to hand each peer the messages addressed to it, oldest first
///
/// Returns true when a transfer started; strategies call this before their
/// own forwarding logic so direct delivery always wins.
pub(crate) fn exchange_deliverable_messages(world: &mut World, host: HostId) -> bool {
    for conn_id in world.connections_of(host) {
        let Some(conn) = world.connection(conn_id) else {
            continue;
        };
        let peer = conn.peer_of(host);
        let deliverable: Vec<String> = {
            let router = world.router(host);
            let mut msgs: Vec<&Message> =
                router.buffer.iter().filter(|m| m.to == peer).collect();
            msgs.sort_by(|a, b| a.receive_time.total_cmp(&b.receive_time));
            msgs.into_iter().map(|m| m.id.clone()).collect()
        };
        for id in deliverable {
            match world.start_transfer(conn_id, host, &id) {
                TransferResult::RcvOk => return true,
                TransferResult::TryLaterBusy => break,
                _ => {}
            }
        }
    }
    false
}

/// Buffered message IDs ordered oldest receive time first
pub(crate) fn fifo_ids(world: &World, host: HostId) -> Vec<String> {
    world.router(host).buffer.ids_fifo()
}
