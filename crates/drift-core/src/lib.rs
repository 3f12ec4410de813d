//! # drift-core
//!
//! Discrete-event simulation engine for delay-tolerant networks: mobile
//! hosts with intermittent connectivity store messages in finite buffers
//! and forward them opportunistically while contacts last.
//!
//! ## Features
//!
//! - **Time-stepped world**: a fixed-interval tick loop driving mobility,
//!   grid-accelerated contact detection and transfer progress.
//!
//! - **Connection state machine**: symmetric links carrying at most one
//!   in-flight message, aborted cleanly when hosts leave range.
//!
//! - **Routing strategies**: epidemic, Spray-and-Wait, the PRoPHET family
//!   (forwarding strategies, queueing policies, PREP, random benchmark),
//!   Bubble Rap with community detection and windowed centrality,
//!   PeopleRank, SimBet, and Spray-and-Focus.
//!
//! - **Bounded buffers**: byte-limited per-host buffers with policy-driven
//!   eviction and reservation for in-flight transfers.
//!
//! - **Reproducibility**: one top-level seed feeds named sub-generators;
//!   identical configuration yields identical results.
//!
//! ## Architecture
//!
//! - [`world`]: arenas, the tick loop, transfer plumbing
//! - [`routing`]: router base and strategy variants
//! - [`settings`] / [`scenario`]: ONE-style configuration and world
//!   construction
//! - [`events`]: message generators and contact-trace replay
//! - [`listeners`]: the report-facing observer traits
//!
//! ## Quick start
//!
//! ```rust
//! use drift_core::{
//!     Coord, HostId, Interface, Movement, Router, RouterConfig, World, WorldConfig,
//! };
//!
//! let mut world = World::new(WorldConfig::default());
//! for i in 0..2 {
//!     world.add_host(
//!         "n",
//!         Some(Coord::new(5.0 * i as f64, 0.0)),
//!         Movement::Stationary,
//!         vec![Interface::new(10.0, 250_000.0)],
//!         Router::new(&RouterConfig::Epidemic, 1_000_000, None),
//!     );
//! }
//! world.create_message(HostId(0), HostId(1), "M1", 500_000).unwrap();
//! world.run_until(10.0).unwrap();
//! assert!(world.router(HostId(1)).is_delivered("M1"));
//! ```

pub mod buffer;
pub mod clock;
pub mod connection;
pub mod coord;
pub mod error;
pub mod events;
pub mod grid;
pub mod host;
pub mod interface;
pub mod listeners;
pub mod message;
pub mod movement;
pub mod routing;
pub mod scenario;
pub mod settings;
pub mod world;

pub use buffer::MessageBuffer;
pub use clock::SimClock;
pub use connection::{Connection, ConnectionId, Transfer, TransferResult};
pub use coord::Coord;
pub use error::{SimError, SimResult};
pub use events::{EventSource, ExternalEvents, MessageEventGenerator, WorldEvent};
pub use host::{Host, HostId};
pub use interface::Interface;
pub use listeners::{ConnectionListener, MessageListener, Report, UpdateListener};
pub use message::{Message, Property};
pub use movement::{Movement, RandomWaypoint};
pub use routing::{Router, RouterConfig, RouterKind};
pub use scenario::Scenario;
pub use settings::Settings;
pub use world::{World, WorldConfig};
