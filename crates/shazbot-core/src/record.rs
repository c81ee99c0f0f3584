//! Wire types exchanged between peers and with the directory.
//!
//! All messages are JSON. Field names match the existing fleet
//! (`baseUrl`, `monitor`, `lastUpdate`) so mixed deployments keep talking.

use serde::{Deserialize, Serialize};

/// A known node in the fleet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerRecord {
    /// Canonical base URL, e.g. `https://node-a:3000/`. Unique per node.
    #[serde(rename = "baseUrl")]
    pub address: String,
    /// Monitors receive every fan-out regardless of sampling
    #[serde(rename = "monitor", default)]
    pub is_monitor: bool,
    /// Milliseconds since the Unix epoch of the last write to this record
    #[serde(rename = "lastUpdate")]
    pub last_update: u64,
}

impl PeerRecord {
    /// Create a new record.
    pub fn new(address: impl Into<String>, is_monitor: bool, last_update: u64) -> Self {
        Self {
            address: address.into(),
            is_monitor,
            last_update,
        }
    }
}

/// A snapshot of the registry, also the directory document.
///
/// `offline` is omitted entirely when the snapshot was taken without it,
/// which is how the directory and unprivileged list queries see the fleet.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerList {
    pub online: Vec<PeerRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline: Option<Vec<PeerRecord>>,
}

impl PeerList {
    /// Online-only list.
    pub fn online(online: Vec<PeerRecord>) -> Self {
        Self {
            online,
            offline: None,
        }
    }

    /// List carrying both partitions.
    pub fn with_offline(online: Vec<PeerRecord>, offline: Vec<PeerRecord>) -> Self {
        Self {
            online,
            offline: Some(offline),
        }
    }

    /// Whether the list contains `address` in its online partition.
    pub fn is_online(&self, address: &str) -> bool {
        self.online.iter().any(|r| r.address == address)
    }

    /// Whether the list contains `address` in its offline partition.
    pub fn is_offline(&self, address: &str) -> bool {
        self.offline
            .as_deref()
            .is_some_and(|off| off.iter().any(|r| r.address == address))
    }
}

/// Envelope discriminator carried in the `message` field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Gossip,
    Control,
}

fn gossip_kind() -> MessageKind {
    MessageKind::Gossip
}

fn control_kind() -> MessageKind {
    MessageKind::Control
}

/// Gossip exchange envelope.
///
/// Sent as the request body of a push and returned as the response,
/// so one round trip is a full bidirectional exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GossipMessage {
    #[serde(default = "gossip_kind")]
    pub message: MessageKind,
    pub online: Vec<PeerRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline: Option<Vec<PeerRecord>>,
}

impl GossipMessage {
    /// The peer list carried by this envelope.
    pub fn into_list(self) -> PeerList {
        PeerList {
            online: self.online,
            offline: self.offline,
        }
    }
}

impl From<PeerList> for GossipMessage {
    fn from(list: PeerList) -> Self {
        Self {
            message: MessageKind::Gossip,
            online: list.online,
            offline: list.offline,
        }
    }
}

impl From<GossipMessage> for PeerList {
    fn from(message: GossipMessage) -> Self {
        message.into_list()
    }
}

/// Administrative command forcing the local node's own state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControlMessage {
    #[serde(default = "control_kind")]
    pub message: MessageKind,
    pub online: bool,
}

impl ControlMessage {
    /// Create a control command.
    pub fn new(online: bool) -> Self {
        Self {
            message: MessageKind::Control,
            online,
        }
    }
}
