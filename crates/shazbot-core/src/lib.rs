//! shazbot-core: gossip-based fleet membership.
//!
//! Every node keeps a registry of which peers are online or offline, each
//! entry stamped with the time its owner last vouched for it. Nodes converge
//! by exchanging registries with random peers and with a shared directory,
//! keeping the newer record whenever two views disagree.
//!
//! This crate provides:
//! - The registry and its last-write-wins merge
//! - The engine that schedules gossip and directory rounds
//! - The `Transport` trait the engine reaches the network through

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod record;
pub mod registry;
pub mod schedule;
pub mod transport;

pub use config::{ConfigError, EngineConfig};
pub use engine::{Engine, Lifecycle};
pub use error::{EngineError, Result};
pub use record::{ControlMessage, GossipMessage, MessageKind, PeerList, PeerRecord};
pub use registry::{MembershipRegistry, MergeOutcome, Presence};
pub use transport::{Transport, TransportError, TransportTimeouts};
