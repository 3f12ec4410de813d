//! Simulated hosts

use serde::{Deserialize, Serialize};

use crate::coord::Coord;
use crate::interface::Interface;
use crate::movement::Movement;
use crate::routing::Router;

/// Stable integer address of a host
///
/// Doubles as the index into the world's host arena.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct HostId(pub usize);

impl std::fmt::Display for HostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A mobile node: identity, position, radios, router (which owns the buffer)
///
/// Hosts are created at simulation startup and live until the end. All host
/// state is mutated only by the owning host's router functions or by the
/// world on the host's behalf.
#[derive(Debug)]
pub struct Host {
    pub address: HostId,
    /// Display name: group prefix followed by the intra-group index
    pub name: String,
    /// Index of the host's group in the world group table
    pub group: usize,
    pub location: Coord,
    pub movement: Movement,
    pub interfaces: Vec<Interface>,
    pub router: Router,
}

impl Host {
    pub fn new(
        address: HostId,
        name: String,
        group: usize,
        location: Coord,
        movement: Movement,
        interfaces: Vec<Interface>,
        router: Router,
    ) -> Self {
        Self {
            address,
            name,
            group,
            location,
            movement,
            interfaces,
            router,
        }
    }

    /// Largest transmit range among this host's interfaces
    pub fn max_range(&self) -> f64 {
        self.interfaces
            .iter()
            .map(|i| i.range)
            .fold(0.0, f64::max)
    }
}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
