//! HTTP implementation of the engine's `Transport`.
//!
//! Gossip is a JSON POST to the peer's `clustershazbot/gossip` route carrying
//! the shared secret in `Authorization`. The directory is a plain JSON
//! document fetched with GET and replaced with PUT.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shazbot_core::record::{GossipMessage, PeerList, PeerRecord};
use shazbot_core::transport::{Transport, TransportError, TransportTimeouts};
use tracing::{debug, warn};

/// Route every node serves gossip exchanges on, relative to its base URL.
pub const GOSSIP_PATH: &str = "clustershazbot/gossip";

/// Join a peer's base URL and the gossip route with exactly one slash.
pub fn gossip_endpoint(base_url: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), GOSSIP_PATH)
}

pub struct HttpTransport {
    client: Client,
    secret: String,
    timeouts: TransportTimeouts,
}

impl HttpTransport {
    pub fn new(secret: impl Into<String>) -> Self {
        Self::with_timeouts(secret, TransportTimeouts::default())
    }

    pub fn with_timeouts(secret: impl Into<String>, timeouts: TransportTimeouts) -> Self {
        Self {
            client: Client::new(),
            secret: secret.into(),
            timeouts,
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }

    async fn exchange(
        &self,
        peer: &PeerRecord,
        message: &GossipMessage,
    ) -> Result<GossipMessage, TransportError> {
        let response = self
            .client
            .post(gossip_endpoint(&peer.address))
            .header(reqwest::header::AUTHORIZATION, &self.secret)
            .timeout(self.timeouts.gossip)
            .json(message)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Self::decode(response).await
    }

    async fn download(&self, url: &str) -> Result<PeerList, TransportError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeouts.directory)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Self::decode(response).await
    }

    async fn upload(&self, url: &str, credential: &str, list: &PeerList) -> Result<(), TransportError> {
        let response = self
            .client
            .put(url)
            .header(reqwest::header::AUTHORIZATION, credential)
            .timeout(self.timeouts.directory)
            .json(list)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn push_gossip(&self, peer: &PeerRecord, message: &GossipMessage) -> Option<GossipMessage> {
        match self.exchange(peer, message).await {
            Ok(reply) => {
                debug!("Gossip exchange with {} succeeded", peer.address);
                Some(reply)
            }
            Err(e) => {
                warn!("Gossip exchange with {} failed: {}", peer.address, e);
                None
            }
        }
    }

    async fn fetch_directory(&self, url: &str) -> Option<PeerList> {
        self.download(url)
            .await
            .inspect_err(|e| warn!("Directory fetch from {} failed: {}", url, e))
            .ok()
    }

    async fn publish_directory(&self, url: &str, credential: &str, list: &PeerList) -> bool {
        self.upload(url, credential, list)
            .await
            .inspect_err(|e| warn!("Directory publish to {} failed: {}", url, e))
            .is_ok()
    }
}
