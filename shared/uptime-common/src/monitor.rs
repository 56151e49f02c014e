use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Check cadences supported by the scheduler.
///
/// Serialized as the interval in seconds (`60` / `300`), which is also the value
/// stored in persisted schedule entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum CheckInterval {
    OneMinute,
    FiveMinutes,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported check interval: {0}s (supported: 60, 300)")]
pub struct UnsupportedInterval(pub u64);

impl CheckInterval {
    pub const ALL: [CheckInterval; 2] = [CheckInterval::OneMinute, CheckInterval::FiveMinutes];

    pub fn as_secs(&self) -> u64 {
        match self {
            CheckInterval::OneMinute => 60,
            CheckInterval::FiveMinutes => 300,
        }
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.as_secs())
    }

    /// Six-field cron expression (`sec min hour dom month dow`) firing on this
    /// cadence's wall-clock boundaries.
    pub fn cron_expression(&self) -> &'static str {
        match self {
            CheckInterval::OneMinute => "0 */1 * * * *",
            CheckInterval::FiveMinutes => "0 */5 * * * *",
        }
    }
}

impl TryFrom<u64> for CheckInterval {
    type Error = UnsupportedInterval;

    fn try_from(secs: u64) -> Result<Self, Self::Error> {
        match secs {
            60 => Ok(CheckInterval::OneMinute),
            300 => Ok(CheckInterval::FiveMinutes),
            other => Err(UnsupportedInterval(other)),
        }
    }
}

impl From<CheckInterval> for u64 {
    fn from(interval: CheckInterval) -> Self {
        interval.as_secs()
    }
}

impl std::fmt::Display for CheckInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.as_secs())
    }
}

/// Monitor configuration as owned by the CRUD layer. Read-only to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub url: String,
    pub check_interval: CheckInterval,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_accepted_status_codes")]
    pub accepted_status_codes: Vec<u16>,
    pub probe_locations: Vec<String>,
    /// Falls back to the engine's default threshold when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_accepted_status_codes() -> Vec<u16> {
    vec![200]
}

impl Monitor {
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        check_interval: CheckInterval,
        probe_locations: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            url: url.into(),
            check_interval,
            timeout_secs: default_timeout_secs(),
            accepted_status_codes: default_accepted_status_codes(),
            probe_locations,
            failure_threshold: None,
        }
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    pub fn failure_threshold_or(&self, default_threshold: u32) -> u32 {
        self.failure_threshold.unwrap_or(default_threshold)
    }

    pub fn has_location(&self, location: &str) -> bool {
        self.probe_locations.iter().any(|l| l == location)
    }

    /// Number of distinct configured locations.
    pub fn location_count(&self) -> usize {
        let mut locations: Vec<&str> = self.probe_locations.iter().map(String::as_str).collect();
        locations.sort_unstable();
        locations.dedup();
        locations.len()
    }

    pub fn is_valid(&self) -> bool {
        !self.probe_locations.is_empty()
    }
}
