//! Gossip engine: bootstrap, periodic rounds, and inbound request handling.
//!
//! The engine owns the registry behind a single lock. Three kinds of activity
//! touch it concurrently:
//!
//! 1. The gossip loop: every ~30s push our full view to one random peer,
//!    retry once after 3s, mark the peer offline if both attempts fail,
//!    otherwise merge the peer's reply
//! 2. The directory loop: every 300-900s fetch and merge the directory,
//!    then publish our online view back to it
//! 3. Inbound requests: gossip exchanges, list queries, control commands
//!
//! Registry operations are short and synchronous; the lock is never held
//! across a transport call.

use crate::clock::now_ms;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::record::{ControlMessage, GossipMessage, PeerList};
use crate::registry::MembershipRegistry;
use crate::schedule::{Shutdown, directory_delay, gossip_delay, run_periodic};
use crate::transport::Transport;

use futures::future::join_all;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Wait before the single retry of a failed gossip push.
pub const GOSSIP_RETRY_BACKOFF: Duration = Duration::from_secs(3);

/// Where the engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, never started
    Idle,
    /// Bootstrapped (or bootstrapping), rounds scheduled
    Running,
    /// Timers cancelled, departure being announced
    ShuttingDown,
    /// Shut down; may be started again
    Stopped,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Idle => "idle",
            Lifecycle::Running => "running",
            Lifecycle::ShuttingDown => "shutting_down",
            Lifecycle::Stopped => "stopped",
        }
    }
}

struct RunState {
    lifecycle: Lifecycle,
    shutdown: Option<Shutdown>,
    tasks: Vec<JoinHandle<()>>,
}

struct Inner {
    config: EngineConfig,
    transport: Arc<dyn Transport>,
    registry: Mutex<MembershipRegistry>,
    run: Mutex<RunState>,
}

/// Handle to a gossip engine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    /// Create an engine with ourselves seeded online. Nothing runs until [`start`](Self::start).
    pub fn new(config: EngineConfig, transport: Arc<dyn Transport>) -> Self {
        let registry = MembershipRegistry::new(config.base_url.clone(), config.monitor, now_ms());

        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                registry: Mutex::new(registry),
                run: Mutex::new(RunState {
                    lifecycle: Lifecycle::Idle,
                    shutdown: None,
                    tasks: Vec::new(),
                }),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.run_state().lifecycle
    }

    /// Whether we currently list ourselves as online.
    pub fn is_self_online(&self) -> bool {
        self.registry().is_self_online()
    }

    fn registry(&self) -> MutexGuard<'_, MembershipRegistry> {
        self.inner.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn run_state(&self) -> MutexGuard<'_, RunState> {
        self.inner.run.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn require_started(&self) -> Result<()> {
        match self.lifecycle() {
            Lifecycle::Running | Lifecycle::ShuttingDown => Ok(()),
            Lifecycle::Idle | Lifecycle::Stopped => Err(EngineError::NotStarted),
        }
    }

    // ==================== Lifecycle ====================

    /// Bootstrap from the directory, then schedule the gossip and directory rounds.
    ///
    /// Does nothing if already running. Starting a stopped engine puts us back online.
    pub async fn start(&self) {
        {
            let mut run = self.run_state();
            match run.lifecycle {
                Lifecycle::Running | Lifecycle::ShuttingDown => {
                    debug!("Engine already running, ignoring start");
                    return;
                }
                Lifecycle::Stopped => self.registry().set_self_online(now_ms()),
                Lifecycle::Idle => {}
            }
            run.lifecycle = Lifecycle::Running;
        }

        self.bootstrap().await;

        let mut run = self.run_state();
        if run.lifecycle != Lifecycle::Running {
            // Shut down while bootstrapping
            return;
        }

        let shutdown = Shutdown::new();
        run.tasks = vec![self.spawn_gossip_loop(&shutdown), self.spawn_directory_loop(&shutdown)];
        run.shutdown = Some(shutdown);

        info!("Engine started as {}", self.inner.config.base_url);
    }

    /// Announce departure and stop scheduling rounds.
    ///
    /// Timers are cancelled first. A round already in flight runs to completion
    /// and is awaited before returning. Does nothing unless running.
    pub async fn shutdown(&self) {
        let tasks = {
            let mut run = self.run_state();
            if run.lifecycle != Lifecycle::Running {
                debug!("Engine not running, ignoring shutdown");
                return;
            }
            run.lifecycle = Lifecycle::ShuttingDown;
            if let Some(shutdown) = run.shutdown.take() {
                shutdown.trigger();
            }
            std::mem::take(&mut run.tasks)
        };

        self.registry().set_self_offline(now_ms());
        self.fan_out("shutdown").await;

        if self.inner.config.update_directory_on_shutdown {
            self.publish_directory().await;
        }

        for task in tasks {
            if let Err(e) = task.await {
                warn!("Round task ended abnormally: {}", e);
            }
        }

        self.run_state().lifecycle = Lifecycle::Stopped;
        info!("Engine shut down");
    }

    fn spawn_gossip_loop(&self, shutdown: &Shutdown) -> JoinHandle<()> {
        let engine = self.clone();
        let base = self.inner.config.gossip_interval;

        tokio::spawn(run_periodic(
            "gossip",
            shutdown.subscribe(),
            move || gossip_delay(base, &mut rand::rng()),
            move || {
                let engine = engine.clone();
                async move { engine.gossip_round().await }
            },
        ))
    }

    fn spawn_directory_loop(&self, shutdown: &Shutdown) -> JoinHandle<()> {
        let engine = self.clone();
        let minimum = self.inner.config.directory_minimum;
        let window = self.inner.config.directory_window;

        tokio::spawn(run_periodic(
            "directory",
            shutdown.subscribe(),
            move || directory_delay(minimum, window, &mut rand::rng()),
            move || {
                let engine = engine.clone();
                async move { engine.directory_round().await }
            },
        ))
    }

    // ==================== Rounds ====================

    async fn bootstrap(&self) {
        let url = &self.inner.config.directory_url;
        let Some(directory) = self.inner.transport.fetch_directory(url).await else {
            warn!("Directory unavailable at {}, starting with only ourselves", url);
            return;
        };

        let outcome = self.registry().merge(&directory, now_ms());
        info!(
            "Bootstrapped from directory: {} peer(s) listed, {} new",
            directory.online.len(),
            outcome.installed_online
        );

        self.fan_out("bootstrap").await;
    }

    /// Push our full view to every gossip target at once.
    ///
    /// Individual failures are ignored. Returns how many peers replied.
    async fn fan_out(&self, reason: &str) -> usize {
        let (targets, message) = {
            let registry = self.registry();
            (
                registry.gossip_targets(),
                GossipMessage::from(registry.snapshot(true)),
            )
        };

        if targets.is_empty() {
            debug!("{}: no peers to gossip with", reason);
            return 0;
        }

        let transport = &self.inner.transport;
        let replies = join_all(
            targets
                .iter()
                .map(|peer| transport.push_gossip(peer, &message)),
        )
        .await;

        let delivered = replies.iter().filter(|r| r.is_some()).count();
        info!(
            "{}: gossip delivered to {}/{} peer(s)",
            reason,
            delivered,
            targets.len()
        );
        delivered
    }

    /// One anti-entropy exchange with a random peer.
    async fn gossip_round(&self) {
        let (target, message) = {
            let mut registry = self.registry();
            registry.touch_self(now_ms());

            let Some(target) = registry.sample_online(1, true).into_iter().next() else {
                debug!("No peers to gossip with");
                return;
            };
            (target, GossipMessage::from(registry.snapshot(true)))
        };

        let transport = &self.inner.transport;
        let mut reply = transport.push_gossip(&target, &message).await;

        if reply.is_none() {
            debug!(
                "Gossip to {} failed, retrying in {:?}",
                target.address, GOSSIP_RETRY_BACKOFF
            );
            tokio::time::sleep(GOSSIP_RETRY_BACKOFF).await;
            reply = transport.push_gossip(&target, &message).await;
        }

        match reply {
            Some(reply) => {
                let outcome = self.registry().merge(&reply.into_list(), now_ms());
                debug!("Gossip with {} merged: {:?}", target.address, outcome);
            }
            None => {
                if self.registry().move_offline(&target.address, now_ms()) {
                    warn!("Peer {} unreachable, marked offline", target.address);
                }
            }
        }
    }

    /// Pull the directory, then publish our online view to it.
    async fn directory_round(&self) {
        let url = &self.inner.config.directory_url;

        match self.inner.transport.fetch_directory(url).await {
            Some(directory) => {
                let outcome = self.registry().merge(&directory, now_ms());
                debug!("Directory merged: {:?}", outcome);
            }
            None => debug!("Directory unavailable at {}", url),
        }

        self.publish_directory().await;
    }

    async fn publish_directory(&self) -> bool {
        let list = self.registry().snapshot(false);
        let config = &self.inner.config;

        let published = self
            .inner
            .transport
            .publish_directory(&config.directory_update_url, &config.directory_update_auth, &list)
            .await;

        if published {
            debug!("Published {} online peer(s) to directory", list.online.len());
        } else {
            warn!("Failed to publish directory to {}", config.directory_update_url);
        }
        published
    }

    // ==================== Inbound requests ====================

    /// Handle a gossip exchange from a peer.
    ///
    /// The credential is checked before anything is touched. On success we
    /// merge the peer's view and reply with our full view.
    pub fn handle_gossip(&self, credential: &str, message: GossipMessage) -> Result<GossipMessage> {
        self.require_started()?;

        if credential != self.inner.config.gossip_secret {
            warn!("Rejected gossip exchange with invalid secret");
            return Err(EngineError::Unauthorized("SHAZBOT_SECRET"));
        }

        let mut registry = self.registry();
        let now = now_ms();
        registry.touch_self(now);
        let outcome = registry.merge(&message.into_list(), now);
        debug!("Inbound gossip merged: {:?}", outcome);

        Ok(registry.snapshot(true).into())
    }

    /// Handle a list query. The control secret unlocks the offline partition.
    pub fn handle_list(&self, credential: Option<&str>) -> Result<PeerList> {
        self.require_started()?;

        let include_offline = credential == Some(self.inner.config.control_secret.as_str());
        Ok(self.registry().snapshot(include_offline))
    }

    /// Handle an administrative command forcing our own state.
    pub fn handle_control(&self, credential: &str, command: &ControlMessage) -> Result<()> {
        self.require_started()?;

        if credential != self.inner.config.control_secret {
            warn!("Rejected control command with invalid secret");
            return Err(EngineError::Unauthorized("SHAZBOT_CONTROL_SECRET"));
        }

        let mut registry = self.registry();
        if command.online {
            registry.set_self_online(now_ms());
        } else {
            registry.set_self_offline(now_ms());
        }
        info!(
            "Control command: now {}",
            if command.online { "online" } else { "offline" }
        );

        Ok(())
    }

    /// Current view of the fleet.
    pub fn snapshot(&self, include_offline: bool) -> Result<PeerList> {
        self.require_started()?;
        Ok(self.registry().snapshot(include_offline))
    }
}
