//! PRoPHET probabilistic routing
//!
//! Each router keeps delivery predictabilities P(self, dest) in [0, 1].
//! Meeting a host raises the direct predictability, peers exchange tables
//! for transitive updates, and all entries decay with simulated time.
//! Aging is lazy: every read advances the table first, at most once per
//! distinct timestamp.
//!
//! The family bundles the forwarding strategies and queueing policies of
//! the V3 router, the PREP previous-predictability variant, and the random
//! benchmark variant that keeps the table but ignores it when forwarding.

use std::collections::BTreeMap;

use rand::Rng;
use tracing::trace;

use crate::error::{SimError, SimResult};
use crate::host::HostId;
use crate::message::Message;
use crate::settings::Settings;
use crate::world::World;

use super::exchange_deliverable_messages;

/// Predictability gained on a direct encounter
pub const P_INIT: f64 = 0.75;
/// Default transitivity scaling factor
pub const DEFAULT_BETA: f64 = 0.25;
/// Default aging constant per time unit
pub const DEFAULT_GAMMA: f64 = 0.98;

/// Which peers are eligible and how candidates are ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardingStrategy {
    /// Forward iff the peer's predictability is higher
    Grtr,
    /// GRTR filter, candidates ordered by descending P_peer − P_self
    GrtrSort,
    /// GRTR filter, candidates ordered by descending P_peer
    GrtrMax,
    /// Fair coin per (message, peer) pair each tick; P is ignored
    Coin,
}

impl ForwardingStrategy {
    fn parse(value: &str) -> SimResult<Self> {
        match value.to_ascii_uppercase().as_str() {
            "GRTR" => Ok(ForwardingStrategy::Grtr),
            "GRTR_SORT" | "GRTRSORT" => Ok(ForwardingStrategy::GrtrSort),
            "GRTR_MAX" | "GRTRMAX" => Ok(ForwardingStrategy::GrtrMax),
            "COIN" => Ok(ForwardingStrategy::Coin),
            other => Err(SimError::config(
                "ProphetV3Router.forwardingStrategy",
                format!("unknown strategy '{other}' (GRTR, GRTR_SORT, GRTR_MAX, COIN)"),
            )),
        }
    }
}

/// Drop order when the buffer overflows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueingPolicy {
    /// Oldest receive time first
    Fifo,
    /// Most forwarded first
    Mofo,
    /// Highest accumulated favorable points first
    Mopr,
    /// Shortest remaining TTL first
    Shli,
    /// Lowest predictability for the destination first
    Lepr,
}

impl QueueingPolicy {
    fn parse(value: &str) -> SimResult<Self> {
        match value.to_ascii_uppercase().as_str() {
            "FIFO" => Ok(QueueingPolicy::Fifo),
            "MOFO" => Ok(QueueingPolicy::Mofo),
            "MOPR" => Ok(QueueingPolicy::Mopr),
            "SHLI" => Ok(QueueingPolicy::Shli),
            "LEPR" => Ok(QueueingPolicy::Lepr),
            other => Err(SimError::config(
                "ProphetV3Router.queueingPolicy",
                format!("unknown policy '{other}' (FIFO, MOFO, MOPR, SHLI, LEPR)"),
            )),
        }
    }
}

/// Variant selection within the PRoPHET family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProphetMode {
    Standard,
    /// Previous-predictability filter on top of GRTR, GRTR_MAX ordering
    Prep,
    /// Coin per pair, shuffled attempt order; P kept only for reporting
    Random,
}

#[derive(Debug, Clone)]
pub struct ProphetConfig {
    /// Seconds per aging time unit
    pub seconds_in_time_unit: f64,
    /// Transitivity scaling factor β
    pub beta: f64,
    /// Aging constant γ
    pub gamma: f64,
    pub forwarding: ForwardingStrategy,
    pub queueing: QueueingPolicy,
    pub mode: ProphetMode,
}

impl Default for ProphetConfig {
    fn default() -> Self {
        Self {
            seconds_in_time_unit: 30.0,
            beta: DEFAULT_BETA,
            gamma: DEFAULT_GAMMA,
            forwarding: ForwardingStrategy::GrtrMax,
            queueing: QueueingPolicy::Fifo,
            mode: ProphetMode::Standard,
        }
    }
}

impl ProphetConfig {
    /// Read the family configuration
    ///
    /// Base parameters live under `ProphetRouter.*` for every variant;
    /// the V3 router additionally reads its policy/strategy selection.
    pub fn from_settings(settings: &Settings, mode: ProphetMode, v3: bool) -> SimResult<Self> {
        let mut config = Self {
            seconds_in_time_unit: settings.get_f64("ProphetRouter.secondsInTimeUnit")?,
            beta: settings.get_f64_or("ProphetRouter.beta", DEFAULT_BETA)?,
            gamma: settings.get_f64_or("ProphetRouter.gamma", DEFAULT_GAMMA)?,
            mode,
            ..Self::default()
        };
        if v3 {
            if let Some(v) = settings.raw("ProphetV3Router.queueingPolicy") {
                config.queueing = QueueingPolicy::parse(v)?;
            }
            if let Some(v) = settings.raw("ProphetV3Router.forwardingStrategy") {
                config.forwarding = ForwardingStrategy::parse(v)?;
            }
        }
        if !(0.0..=1.0).contains(&config.gamma) {
            return Err(SimError::config(
                "ProphetRouter.gamma",
                format!("{} outside [0,1]", config.gamma),
            ));
        }
        Ok(config)
    }
}

#[derive(Debug)]
pub struct ProphetRouter {
    config: ProphetConfig,
    preds: BTreeMap<HostId, f64>,
    last_age: f64,
    /// Forwarding count per message (MOFO)
    fwd_counts: BTreeMap<String, u32>,
    /// Accumulated favorable points per message (MOPR)
    favorable: BTreeMap<String, f64>,
    /// Predictability held when a message for a destination arrived (PREP)
    prev_preds: BTreeMap<HostId, f64>,
}

impl ProphetRouter {
    pub fn new(config: ProphetConfig) -> Self {
        Self {
            config,
            preds: BTreeMap::new(),
            last_age: 0.0,
            fwd_counts: BTreeMap::new(),
            favorable: BTreeMap::new(),
            prev_preds: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &ProphetConfig {
        &self.config
    }

    /// Age all predictabilities: P ← P · γ^k, k in elapsed time units
    ///
    /// A no-op when no simulated time has passed, so repeated reads within
    /// one tick age at most once.
    fn age(&mut self, now: f64) {
        let k = (now - self.last_age) / self.config.seconds_in_time_unit;
        if k <= 0.0 {
            return;
        }
        let mult = self.config.gamma.powf(k);
        for p in self.preds.values_mut() {
            *p *= mult;
            debug_assert!((0.0..=1.0).contains(p));
        }
        self.last_age = now;
    }

    /// Current predictability for a destination, aged to `now`
    pub fn pred_for(&mut self, host: HostId, now: f64) -> f64 {
        self.age(now);
        self.preds.get(&host).copied().unwrap_or(0.0)
    }

    /// Predictability aged to `now` without mutating the table
    ///
    /// Used by the drop policy, which runs behind a shared world borrow.
    pub fn aged_pred(&self, host: HostId, now: f64) -> f64 {
        let p = self.preds.get(&host).copied().unwrap_or(0.0);
        let k = (now - self.last_age) / self.config.seconds_in_time_unit;
        if k <= 0.0 { p } else { p * self.config.gamma.powf(k) }
    }

    /// Direct encounter update: P ← P + (1 − P) · P_INIT
    pub(crate) fn met(&mut self, peer: HostId, now: f64) {
        self.age(now);
        let old = self.preds.get(&peer).copied().unwrap_or(0.0);
        let new = old + (1.0 - old) * P_INIT;
        debug_assert!((0.0..=1.0).contains(&new));
        self.preds.insert(peer, new);
    }

    /// Transitive update through a met peer B:
    /// P(a,c) ← P(a,c) + (1 − P(a,c)) · P(a,b) · P(b,c) · β
    pub(crate) fn transitive_update(
        &mut self,
        peer: HostId,
        peer_preds: &BTreeMap<HostId, f64>,
        me: HostId,
        now: f64,
    ) {
        let p_ab = self.pred_for(peer, now);
        for (&dest, &p_bc) in peer_preds {
            if dest == me {
                continue;
            }
            let old = self.preds.get(&dest).copied().unwrap_or(0.0);
            let new = old + (1.0 - old) * p_ab * p_bc * self.config.beta;
            debug_assert!((0.0..=1.0).contains(&new));
            self.preds.insert(dest, new);
        }
    }

    /// Aged copy of the whole table, for exchange with a peer
    pub(crate) fn preds_snapshot(&mut self, now: f64) -> BTreeMap<HostId, f64> {
        self.age(now);
        self.preds.clone()
    }

    /// All current predictabilities (reporting)
    pub fn preds(&self) -> &BTreeMap<HostId, f64> {
        &self.preds
    }

    pub fn prev_pred(&self, dest: HostId) -> Option<f64> {
        self.prev_preds.get(&dest).copied()
    }

    pub(crate) fn record_prev_pred(&mut self, dest: HostId, p: f64) {
        self.prev_preds.insert(dest, p);
    }

    pub(crate) fn note_forwarded(&mut self, msg_id: &str) {
        *self.fwd_counts.entry(msg_id.to_string()).or_insert(0) += 1;
    }

    pub(crate) fn add_favorable(&mut self, msg_id: &str, points: f64) {
        *self.favorable.entry(msg_id.to_string()).or_insert(0.0) += points;
    }

    /// Drop auxiliary per-message state once the message is gone
    pub(crate) fn forget_message(&mut self, msg_id: &str) {
        self.fwd_counts.remove(msg_id);
        self.favorable.remove(msg_id);
    }
}

pub(crate) fn changed_connection(world: &mut World, host: HostId, peer: HostId, up: bool) {
    if !up {
        return;
    }
    let now = world.clock().time();
    // A peer running another router is skipped for table exchange but can
    // still take part in plain message transfers.
    if world.router(peer).as_prophet().is_none() {
        return;
    }
    let (mine_host, peer_host) = world.host_pair_mut(host, peer);
    let Some(peer_router) = peer_host.router.as_prophet_mut() else {
        return;
    };
    let snapshot = peer_router.preds_snapshot(now);
    let Some(mine) = mine_host.router.as_prophet_mut() else {
        return;
    };
    mine.met(peer, now);
    mine.transitive_update(peer, &snapshot, host, now);
    trace!(host = %host, peer = %peer, "predictability exchange");
}

struct Candidate {
    id: String,
    conn: crate::connection::ConnectionId,
    p_peer: f64,
    gain: f64,
    receive_time: f64,
}

pub(crate) fn update(world: &mut World, host: HostId) {
    if exchange_deliverable_messages(world, host) {
        return;
    }

    let now = world.clock().time();
    let (mode, strategy) = match world.router(host).as_prophet() {
        Some(p) => (p.config.mode, p.config.forwarding),
        None => return,
    };
    let my_preds = match world.router_mut(host).as_prophet_mut() {
        Some(p) => p.preds_snapshot(now),
        None => return,
    };
    let msgs: Vec<(String, HostId, f64)> = world
        .router(host)
        .buffer
        .iter()
        .map(|m| (m.id.clone(), m.to, m.receive_time))
        .collect();

    let use_coin = mode == ProphetMode::Random || strategy == ForwardingStrategy::Coin;
    let mut candidates: Vec<Candidate> = Vec::new();

    for conn_id in world.connections_of(host) {
        let Some(conn) = world.connection(conn_id) else {
            continue;
        };
        let peer = conn.peer_of(host);
        if world.is_transferring(peer) {
            continue;
        }
        // Strategies that compare predictabilities need a PRoPHET peer;
        // the coin-based ones work against any router.
        let peer_preds = world
            .router_mut(peer)
            .as_prophet_mut()
            .map(|p| p.preds_snapshot(now));
        if !use_coin && peer_preds.is_none() {
            continue;
        }

        for (id, to, receive_time) in &msgs {
            if to == &peer {
                continue;
            }
            {
                let theirs = world.router(peer);
                if theirs.buffer.has(id) || theirs.is_delivered(id) {
                    continue;
                }
            }
            if use_coin {
                candidates.push(Candidate {
                    id: id.clone(),
                    conn: conn_id,
                    p_peer: 0.0,
                    gain: 0.0,
                    receive_time: *receive_time,
                });
                continue;
            }
            let peer_preds = peer_preds.as_ref().unwrap_or(&my_preds);
            let p_peer = peer_preds.get(to).copied().unwrap_or(0.0);
            let p_mine = my_preds.get(to).copied().unwrap_or(0.0);
            if p_peer <= p_mine {
                continue;
            }
            if mode == ProphetMode::Prep {
                let prev = world
                    .router(host)
                    .as_prophet()
                    .and_then(|p| p.prev_pred(*to));
                if let Some(prev) = prev
                    && p_peer < prev
                {
                    continue;
                }
            }
            candidates.push(Candidate {
                id: id.clone(),
                conn: conn_id,
                p_peer,
                gain: p_peer - p_mine,
                receive_time: *receive_time,
            });
        }
    }

    if candidates.is_empty() {
        return;
    }

    if use_coin {
        // Independent fair coin per (message, peer) pair
        let rng = world.routing_rng();
        candidates.retain(|_| rng.random_bool(0.5));
        if mode == ProphetMode::Random {
            use rand::seq::SliceRandom;
            candidates.shuffle(rng);
        } else {
            candidates.sort_by(|a, b| a.receive_time.total_cmp(&b.receive_time));
        }
    } else {
        let order = if mode == ProphetMode::Prep {
            ForwardingStrategy::GrtrMax
        } else {
            strategy
        };
        match order {
            ForwardingStrategy::GrtrSort => candidates.sort_by(|a, b| {
                b.gain
                    .total_cmp(&a.gain)
                    .then(a.receive_time.total_cmp(&b.receive_time))
            }),
            ForwardingStrategy::GrtrMax => candidates.sort_by(|a, b| {
                b.p_peer
                    .total_cmp(&a.p_peer)
                    .then(a.receive_time.total_cmp(&b.receive_time))
            }),
            ForwardingStrategy::Grtr | ForwardingStrategy::Coin => {
                candidates.sort_by(|a, b| a.receive_time.total_cmp(&b.receive_time))
            }
        }
    }

    for cand in candidates {
        if world.start_transfer(cand.conn, host, &cand.id).is_ok() {
            return;
        }
    }
}

/// Sender side: maintain MOFO counts and MOPR favorable points
pub(crate) fn transfer_done(world: &mut World, sender: HostId, receiver: HostId, msg_id: &str) {
    let now = world.clock().time();
    let dest = world.router(sender).buffer.get(msg_id).map(|m| m.to);
    let receiver_pred = dest.and_then(|d| {
        world
            .router_mut(receiver)
            .as_prophet_mut()
            .map(|p| p.pred_for(d, now))
    });
    let Some(mine) = world.router_mut(sender).as_prophet_mut() else {
        return;
    };
    mine.note_forwarded(msg_id);
    if let Some(points) = receiver_pred {
        mine.add_favorable(msg_id, points);
    }
}

/// Receiver side (PREP): remember the predictability held for the
/// destination at the moment the message arrived
pub(crate) fn message_received(world: &mut World, receiver: HostId, msg_id: &str) {
    let now = world.clock().time();
    let dest = world.router(receiver).buffer.get(msg_id).map(|m| m.to);
    let Some(mine) = world.router_mut(receiver).as_prophet_mut() else {
        return;
    };
    if mine.config.mode != ProphetMode::Prep {
        return;
    }
    if let Some(dest) = dest
        && dest != receiver
    {
        let p = mine.pred_for(dest, now);
        mine.record_prev_pred(dest, p);
    }
}

/// Drop victim per the configured queueing policy; ties break oldest first
pub(crate) fn next_message_to_remove(
    router: &ProphetRouter,
    candidates: &[&Message],
    now: f64,
) -> Option<String> {
    let oldest =
        |a: &&Message, b: &&Message| a.receive_time.total_cmp(&b.receive_time);
    let pick = match router.config.queueing {
        QueueingPolicy::Fifo => candidates.iter().copied().min_by(oldest),
        QueueingPolicy::Mofo => candidates.iter().copied().min_by(|a, b| {
            let fa = router.fwd_counts.get(&a.id).copied().unwrap_or(0);
            let fb = router.fwd_counts.get(&b.id).copied().unwrap_or(0);
            fb.cmp(&fa).then(oldest(a, b))
        }),
        QueueingPolicy::Mopr => candidates.iter().copied().min_by(|a, b| {
            let fa = router.favorable.get(&a.id).copied().unwrap_or(0.0);
            let fb = router.favorable.get(&b.id).copied().unwrap_or(0.0);
            fb.total_cmp(&fa).then(oldest(a, b))
        }),
        QueueingPolicy::Shli => candidates.iter().copied().min_by(|a, b| {
            a.remaining_ttl(now)
                .total_cmp(&b.remaining_ttl(now))
                .then(oldest(a, b))
        }),
        QueueingPolicy::Lepr => candidates.iter().copied().min_by(|a, b| {
            router
                .aged_pred(a.to, now)
                .total_cmp(&router.aged_pred(b.to, now))
                .then(oldest(a, b))
        }),
    };
    pick.map(|m| m.id.clone())
}
