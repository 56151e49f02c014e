use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::alert::AlertType;

/// Per-monitor failure tracking persisted in the durable store.
///
/// A missing or expired record is equivalent to `AlertTrackingState::new`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertTrackingState {
    pub monitor_id: String,
    #[serde(default)]
    pub consecutive_failures: u32,
    /// Locations whose most recent check failed.
    #[serde(default)]
    pub failing_locations: BTreeSet<String>,
    /// Locations that failed since the counter last advanced or reset
    /// (only meaningful in `all` trigger mode).
    #[serde(default)]
    pub round_failures: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_in_failure_state: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_alert_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_alert_type: Option<AlertType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_alert_at: Option<DateTime<Utc>>,
}

impl AlertTrackingState {
    pub fn new(monitor_id: impl Into<String>) -> Self {
        Self {
            monitor_id: monitor_id.into(),
            consecutive_failures: 0,
            failing_locations: BTreeSet::new(),
            round_failures: BTreeSet::new(),
            last_failure_at: None,
            is_in_failure_state: false,
            last_alert_id: None,
            last_alert_type: None,
            last_alert_at: None,
        }
    }

    pub fn record_alert(&mut self, alert_id: &str, alert_type: AlertType, at: DateTime<Utc>) {
        self.last_alert_id = Some(alert_id.to_string());
        self.last_alert_type = Some(alert_type);
        self.last_alert_at = Some(at);
    }

    /// Clears failure progress after a recovery. Last-alert bookkeeping is kept.
    pub fn clear_failures(&mut self) {
        self.consecutive_failures = 0;
        self.failing_locations.clear();
        self.round_failures.clear();
        self.is_in_failure_state = false;
    }

    /// True when every given location is currently failing.
    pub fn all_failing<'a>(&self, locations: impl IntoIterator<Item = &'a String>) -> bool {
        let mut any = false;
        for location in locations {
            any = true;
            if !self.failing_locations.contains(location) {
                return false;
            }
        }
        any
    }
}
