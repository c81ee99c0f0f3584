//! Engine configuration loaded from environment variables.

use std::time::Duration;
use thiserror::Error;

const SECRET: &str = "SHAZBOT_SECRET";
const CONTROL_SECRET: &str = "SHAZBOT_CONTROL_SECRET";
const BASE_URL: &str = "SHAZBOT_BASE_URL";
const DIRECTORY_URL: &str = "SHAZBOT_MASTER_LIST";
const DIRECTORY_UPDATE_URL: &str = "SHAZBOT_MASTER_LIST_UPDATE";
const DIRECTORY_UPDATE_AUTH: &str = "SHAZBOT_MASTER_LIST_UPDATE_AUTH";
const GOSSIP_INTERVAL: &str = "SHAZBOT_GOSSIP_INTERVAL";
const DIRECTORY_MINIMUM: &str = "SHAZBOT_MASTER_ANNOUNCE_MINIMUM";
const DIRECTORY_WINDOW: &str = "SHAZBOT_MASTER_ANNOUNCE_INTERVAL";
const UPDATE_ON_SHUTDOWN: &str = "SHAZBOT_UPDATE_MASTER_LIST_ON_SHUTDOWN";
const MONITOR: &str = "SHAZBOT_MONITOR";

/// Longest interval any timer setting may ask for: one week.
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    #[error("{name} must be a whole number of seconds, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("{name} must be at most {max} seconds, got {value}")]
    IntervalTooLong { name: &'static str, value: u64, max: u64 },
}

/// Everything the engine needs to run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Shared secret peers present on gossip exchanges
    pub gossip_secret: String,
    /// Stronger secret for control commands and the extended list view
    pub control_secret: String,
    /// Our canonical base URL, used as our identity
    pub base_url: String,
    /// Directory document fetched on bootstrap and every directory round
    pub directory_url: String,
    /// Endpoint the online list is published to
    pub directory_update_url: String,
    /// Credential sent when publishing
    pub directory_update_auth: String,
    /// Base gossip interval (default: 30s), jittered by ±10% per round
    pub gossip_interval: Duration,
    /// Minimum delay between directory rounds (default: 300s)
    pub directory_minimum: Duration,
    /// Width of the random window added to the minimum (default: 600s)
    pub directory_window: Duration,
    /// Publish the directory once more on shutdown (default: false)
    pub update_directory_on_shutdown: bool,
    /// Advertise ourselves as a monitor (default: false)
    pub monitor: bool,
}

impl EngineConfig {
    /// Load configuration from the process environment.
    ///
    /// Required environment variables:
    /// - `SHAZBOT_SECRET`, `SHAZBOT_CONTROL_SECRET`
    /// - `SHAZBOT_BASE_URL`
    /// - `SHAZBOT_MASTER_LIST`, `SHAZBOT_MASTER_LIST_UPDATE`, `SHAZBOT_MASTER_LIST_UPDATE_AUTH`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let gossip_interval = vars.seconds(GOSSIP_INTERVAL, 30)?;
        if gossip_interval.is_zero() {
            return Err(ConfigError::ZeroInterval(GOSSIP_INTERVAL));
        }

        Ok(Self {
            gossip_secret: vars.required(SECRET)?,
            control_secret: vars.required(CONTROL_SECRET)?,
            base_url: vars.required(BASE_URL)?,
            directory_url: vars.required(DIRECTORY_URL)?,
            directory_update_url: vars.required(DIRECTORY_UPDATE_URL)?,
            directory_update_auth: vars.required(DIRECTORY_UPDATE_AUTH)?,
            gossip_interval,
            directory_minimum: vars.seconds(DIRECTORY_MINIMUM, 300)?,
            directory_window: vars.seconds(DIRECTORY_WINDOW, 600)?,
            update_directory_on_shutdown: vars.flag(UPDATE_ON_SHUTDOWN),
            monitor: vars.flag(MONITOR),
        })
    }
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    fn seconds(&self, name: &'static str, default: u64) -> Result<Duration, ConfigError> {
        let secs = match self.get(name) {
            None => default,
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber { name, value })?,
        };

        if secs > MAX_INTERVAL_SECS {
            return Err(ConfigError::IntervalTooLong {
                name,
                value: secs,
                max: MAX_INTERVAL_SECS,
            });
        }
        Ok(Duration::from_secs(secs))
    }

    fn flag(&self, name: &str) -> bool {
        self.get(name)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }
}
