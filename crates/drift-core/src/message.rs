//! Messages exchanged between hosts
//!
//! A message carries no payload bytes, only a size: the simulator models
//! transfer time and buffer pressure, not content. Strategy-specific state
//! rides along in a typed property bag keyed by strategy-qualified names
//! (for example `SprayAndWait.copies`), and the hop path records every host
//! the message has passed through.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::host::HostId;

/// A typed value in the message property bag
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Property {
    Int(u32),
    Float(f64),
}

impl Property {
    pub fn as_int(self) -> Option<u32> {
        match self {
            Property::Int(v) => Some(v),
            Property::Float(_) => None,
        }
    }

    pub fn as_float(self) -> Option<f64> {
        match self {
            Property::Float(v) => Some(v),
            Property::Int(_) => None,
        }
    }
}

/// A store-and-forward message
///
/// Copies of the same message (same `id`) may live in many buffers at once;
/// each buffer holds its own instance so per-holder state such as remaining
/// spray copies can diverge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Stable identity, shared by all copies
    pub id: String,
    /// Originating host
    pub from: HostId,
    /// Final destination
    pub to: HostId,
    /// Payload size in bytes
    pub size: u32,
    /// Simulated creation time in seconds
    pub created_at: f64,
    /// Time this copy was received by its current holder
    pub receive_time: f64,
    /// Time-to-live in minutes; `None` never expires
    pub ttl: Option<f64>,
    /// Hosts this copy has passed through, starting with the source
    path: Vec<HostId>,
    properties: BTreeMap<String, Property>,
}

impl Message {
    /// Create a new message originating at `from` at simulated time `now`
    pub fn new(id: impl Into<String>, from: HostId, to: HostId, size: u32, now: f64) -> Self {
        Self {
            id: id.into(),
            from,
            to,
            size,
            created_at: now,
            receive_time: now,
            ttl: None,
            path: vec![from],
            properties: BTreeMap::new(),
        }
    }

    /// Set the time-to-live in minutes
    pub fn with_ttl(mut self, minutes: f64) -> Self {
        self.ttl = Some(minutes);
        self
    }

    /// Remaining TTL in minutes at simulated time `now`
    ///
    /// Infinite when no TTL was assigned.
    pub fn remaining_ttl(&self, now: f64) -> f64 {
        match self.ttl {
            Some(minutes) => minutes - (now - self.created_at) / 60.0,
            None => f64::INFINITY,
        }
    }

    /// Whether the message has outlived its TTL
    pub fn is_expired(&self, now: f64) -> bool {
        self.remaining_ttl(now) <= 0.0
    }

    /// Hosts this copy has passed through
    pub fn path(&self) -> &[HostId] {
        &self.path
    }

    /// Number of forwarding hops taken so far
    pub fn hop_count(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Whether a host already appears in the hop path
    pub fn was_carried_by(&self, host: HostId) -> bool {
        self.path.contains(&host)
    }

    /// Append a host to the hop path
    ///
    /// The path must stay free of repeats; revisits are rejected earlier by
    /// the receive checks.
    pub(crate) fn record_hop(&mut self, host: HostId) {
        debug_assert!(!self.path.contains(&host), "host revisited in hop path");
        self.path.push(host);
    }

    pub fn property(&self, key: &str) -> Option<Property> {
        self.properties.get(key).copied()
    }

    pub fn int_property(&self, key: &str) -> Option<u32> {
        self.property(key).and_then(Property::as_int)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: Property) {
        self.properties.insert(key.into(), value);
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}->{} ({}B)", self.id, self.from, self.to, self.size)
    }
}
