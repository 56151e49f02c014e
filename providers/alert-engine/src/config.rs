//! Configuration for the alert engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::RetryConfig;
use crate::{AlertEngineError, Result};

/// How per-location failures combine into the consecutive-failure counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// Every configured location must be failing before the counter advances.
    #[default]
    All,
    /// Any failing check advances the counter.
    Any,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertEngineConfig {
    /// Used when a monitor has no failure threshold of its own
    #[serde(default = "default_failure_threshold")]
    pub default_failure_threshold: u32,

    #[serde(default = "default_ssl_warning_days")]
    pub ssl_warning_days: i64,

    #[serde(default = "default_ssl_critical_days")]
    pub ssl_critical_days: i64,

    /// TTL of the tracking state and per-location counters (seconds)
    #[serde(default = "default_alert_state_ttl_secs")]
    pub alert_state_ttl_secs: u64,

    #[serde(default)]
    pub trigger_mode: TriggerMode,

    /// Same-type SSL alerts are raised at most once per window (seconds)
    #[serde(default = "default_ssl_alert_window_secs")]
    pub ssl_alert_window_secs: u64,

    /// Open an incident alongside each failure alert
    #[serde(default = "default_true")]
    pub create_incidents: bool,

    #[serde(default = "default_notification_max_attempts")]
    pub notification_max_attempts: u32,

    #[serde(default = "default_notification_initial_delay_ms")]
    pub notification_initial_delay_ms: u64,
}

impl AlertEngineConfig {
    /// Load configuration from `ALERT_ENGINE_*` environment variables
    pub fn from_env() -> std::result::Result<Self, envy::Error> {
        envy::prefixed("ALERT_ENGINE_").from_env()
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_failure_threshold == 0 {
            return Err(AlertEngineError::Configuration(
                "default_failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.ssl_critical_days > self.ssl_warning_days {
            return Err(AlertEngineError::Configuration(format!(
                "ssl_critical_days ({}) must not exceed ssl_warning_days ({})",
                self.ssl_critical_days, self.ssl_warning_days
            )));
        }
        if self.notification_max_attempts == 0 {
            return Err(AlertEngineError::Configuration(
                "notification_max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn alert_state_ttl(&self) -> Duration {
        Duration::from_secs(self.alert_state_ttl_secs)
    }

    pub fn ssl_alert_window(&self) -> Duration {
        Duration::from_secs(self.ssl_alert_window_secs)
    }

    /// Retry policy for notification dispatch.
    pub fn notification_retry(&self) -> RetryConfig {
        RetryConfig::new(self.notification_max_attempts, self.notification_initial_delay_ms)
    }
}

impl Default for AlertEngineConfig {
    fn default() -> Self {
        Self {
            default_failure_threshold: default_failure_threshold(),
            ssl_warning_days: default_ssl_warning_days(),
            ssl_critical_days: default_ssl_critical_days(),
            alert_state_ttl_secs: default_alert_state_ttl_secs(),
            trigger_mode: TriggerMode::default(),
            ssl_alert_window_secs: default_ssl_alert_window_secs(),
            create_incidents: true,
            notification_max_attempts: default_notification_max_attempts(),
            notification_initial_delay_ms: default_notification_initial_delay_ms(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_ssl_warning_days() -> i64 {
    30
}

fn default_ssl_critical_days() -> i64 {
    7
}

fn default_alert_state_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_ssl_alert_window_secs() -> u64 {
    24 * 60 * 60
}

fn default_true() -> bool {
    true
}

fn default_notification_max_attempts() -> u32 {
    3
}

fn default_notification_initial_delay_ms() -> u64 {
    200
}
