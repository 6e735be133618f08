//! Runtime configuration for the tally engine.
//!
//! Values come from the environment (a `.env` file is honoured by the binary):
//!
//! | variable | field | default |
//! |---|---|---|
//! | `VOTE_QUEUE_SIZE` | `queue_capacity` | 1,000,000 |
//! | `VOTE_WORKERS` | `worker_count` | available parallelism |
//! | `SKIP_VOTER_TRACK` | `skip_voter_tracking` | false |
//! | `VOTE_SHUTDOWN_TIMEOUT_MS` | `shutdown_timeout_ms` | 5000 |
//! | `VOTE_STATS_INTERVAL_SECS` | `stats_interval_secs` | 10 (0 disables) |
//!
//! ```
//! use vote_tally::TallyConfig;
//!
//! let config = TallyConfig {
//!     queue_capacity: 1024,
//!     worker_count: 2,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! assert!(!config.skip_voter_tracking);
//! ```

use std::time::Duration;

use log::warn;
use serde::Deserialize;
use thiserror::Error;

pub const QUEUE_SIZE_VAR: &str = "VOTE_QUEUE_SIZE";
pub const WORKERS_VAR: &str = "VOTE_WORKERS";
pub const SKIP_VOTER_TRACK_VAR: &str = "SKIP_VOTER_TRACK";
pub const SHUTDOWN_TIMEOUT_VAR: &str = "VOTE_SHUTDOWN_TIMEOUT_MS";
pub const STATS_INTERVAL_VAR: &str = "VOTE_STATS_INTERVAL_SECS";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("queue capacity must be positive")]
    ZeroQueueCapacity,
    #[error("worker count must be positive")]
    ZeroWorkers,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TallyConfig {
    /// Pending votes the ingestion queue holds before rejecting new ones
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Workers applying queued votes to the store
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Disable duplicate-voter detection entirely (throughput measurement mode)
    #[serde(default)]
    pub skip_voter_tracking: bool,

    /// Upper bound on how long `close` drains the queue
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Period of the stats reporter in seconds
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_queue_capacity() -> usize { 1_000_000 }
fn default_shutdown_timeout_ms() -> u64 { 5_000 }
fn default_stats_interval_secs() -> u64 { 10 }

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            worker_count: default_worker_count(),
            skip_voter_tracking: false,
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

impl TallyConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any key lookup. Missing keys keep their
    /// defaults; malformed ones are logged and also keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(n) = parse_positive(&lookup, QUEUE_SIZE_VAR, config.queue_capacity) {
            config.queue_capacity = n;
        }
        if let Some(n) = parse_positive(&lookup, WORKERS_VAR, config.worker_count) {
            config.worker_count = n;
        }
        if let Some(raw) = lookup(SKIP_VOTER_TRACK_VAR) {
            config.skip_voter_tracking = matches!(raw.trim(), "1" | "true" | "TRUE" | "yes");
        }
        if let Some(raw) = lookup(SHUTDOWN_TIMEOUT_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.shutdown_timeout_ms = ms,
                Err(_) => warn!(
                    "invalid {}={:?}, using default {}",
                    SHUTDOWN_TIMEOUT_VAR, raw, config.shutdown_timeout_ms
                ),
            }
        }
        if let Some(raw) = lookup(STATS_INTERVAL_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => config.stats_interval_secs = secs,
                Err(_) => warn!(
                    "invalid {}={:?}, using default {}",
                    STATS_INTERVAL_VAR, raw, config.stats_interval_secs
                ),
            }
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.worker_count == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// `None` when periodic stats reporting is turned off.
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }
}

fn parse_positive<F>(lookup: &F, key: &str, fallback: usize) -> Option<usize>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            warn!("invalid {}={:?}, using default {}", key, raw, fallback);
            None
        }
    }
}
