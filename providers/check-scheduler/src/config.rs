//! Configuration for the check scheduler

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{Result, SchedulerError};

/// Configuration for the check scheduler.
///
/// Loaded from `CHECK_SCHEDULER_*` environment variables by [`SchedulerConfig::from_env`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Redis connection URL (schedule table, fire locks, due-check channel)
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Redis connection pool size
    #[serde(default = "default_pool_size")]
    pub redis_pool_size: usize,

    /// Persist schedule entries and restore them on start
    #[serde(default = "default_true")]
    pub persistence_enabled: bool,

    /// Process-wide ceiling on concurrently running callbacks
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,

    /// How long `stop()` waits for running callbacks (milliseconds)
    #[serde(default = "default_overlap_timeout_ms")]
    pub overlap_timeout_ms: u64,

    /// Claim each tick in the durable store so only one instance fires it
    #[serde(default = "default_true")]
    pub distributed_fire_lock: bool,

    /// Period of the binary's reconcile loop (seconds)
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    /// Channel the binary publishes `CheckDueV1` messages on
    #[serde(default = "default_due_channel")]
    pub due_channel: String,
}

impl SchedulerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> std::result::Result<Self, envy::Error> {
        envy::prefixed("CHECK_SCHEDULER_").from_env()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_checks == 0 {
            return Err(SchedulerError::Configuration(
                "max_concurrent_checks must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrent_checks > tokio::sync::Semaphore::MAX_PERMITS
            || u32::try_from(self.max_concurrent_checks).is_err()
        {
            return Err(SchedulerError::Configuration(format!(
                "max_concurrent_checks {} is too large",
                self.max_concurrent_checks
            )));
        }
        if self.reconcile_interval_secs == 0 {
            return Err(SchedulerError::Configuration(
                "reconcile_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn overlap_timeout(&self) -> Duration {
        Duration::from_millis(self.overlap_timeout_ms)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            redis_pool_size: default_pool_size(),
            persistence_enabled: true,
            max_concurrent_checks: default_max_concurrent_checks(),
            overlap_timeout_ms: default_overlap_timeout_ms(),
            distributed_fire_lock: true,
            reconcile_interval_secs: default_reconcile_interval_secs(),
            due_channel: default_due_channel(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_pool_size() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent_checks() -> usize {
    50
}

fn default_overlap_timeout_ms() -> u64 {
    30_000
}

fn default_reconcile_interval_secs() -> u64 {
    60
}

fn default_due_channel() -> String {
    uptime_common::CHECKS_DUE_CHANNEL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert!(config.persistence_enabled);
        assert!(config.distributed_fire_lock);
        assert_eq!(config.max_concurrent_checks, 50);
        assert_eq!(config.overlap_timeout(), Duration::from_secs(30));
        assert_eq!(config.due_channel, "uptime:checks:due");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serde_defaults_match_default_impl() {
        let config: SchedulerConfig = serde_json::from_str("{}").unwrap();
        let default = SchedulerConfig::default();
        assert_eq!(config.redis_url, default.redis_url);
        assert_eq!(config.overlap_timeout_ms, default.overlap_timeout_ms);
        assert_eq!(config.reconcile_interval_secs, default.reconcile_interval_secs);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = SchedulerConfig {
            max_concurrent_checks: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SchedulerError::Configuration(_))
        ));
    }
}
