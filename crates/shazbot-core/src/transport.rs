//! Transport trait for reaching peers and the directory.
//!
//! Implementations:
//! - HTTP: `shazbot-daemon`'s `HttpTransport` (reqwest, JSON bodies)
//!
//! Every method is fail-soft. Network errors, timeouts and rejected
//! statuses all come back as `None` / `false`; the engine never needs
//! to tell them apart.

use crate::record::{GossipMessage, PeerList, PeerRecord};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Why a transport call failed. Logged by implementations, never returned.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected status: {0}")]
    Status(u16),

    #[error("Invalid response body: {0}")]
    Decode(String),
}

/// Per-operation timeouts.
#[derive(Debug, Clone)]
pub struct TransportTimeouts {
    /// Gossip push (default: 5s)
    pub gossip: Duration,
    /// Directory fetch and publish (default: 10s)
    pub directory: Duration,
}

impl Default for TransportTimeouts {
    fn default() -> Self {
        Self {
            gossip: Duration::from_secs(5),
            directory: Duration::from_secs(10),
        }
    }
}

/// Network operations used by the engine.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Push a gossip exchange to a peer and return its reply.
    async fn push_gossip(&self, peer: &PeerRecord, message: &GossipMessage)
    -> Option<GossipMessage>;

    /// Download the directory document.
    async fn fetch_directory(&self, url: &str) -> Option<PeerList>;

    /// Upload our online list to the directory. Returns true on success.
    async fn publish_directory(&self, url: &str, credential: &str, list: &PeerList) -> bool;
}
