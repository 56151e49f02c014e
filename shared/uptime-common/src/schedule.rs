use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::monitor::{CheckInterval, UnsupportedInterval};

/// Persisted schedule entry stored at `uptime:schedule:{monitor_id}`.
///
/// `interval` is kept as raw seconds so that entries written with an
/// unsupported value still deserialize and can be reported on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub interval: u64,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
}

impl ScheduleEntry {
    pub fn new(interval: CheckInterval) -> Self {
        Self {
            interval: interval.as_secs(),
            last_updated: Utc::now(),
        }
    }

    pub fn interval(&self) -> Result<CheckInterval, UnsupportedInterval> {
        CheckInterval::try_from(self.interval)
    }
}

/// Published on the checks-due channel each time a scheduled monitor fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckDueV1 {
    pub schema_version: String,
    pub monitor_id: String,
    pub interval_secs: u64,
    pub scheduled_for: DateTime<Utc>,
    pub requested_at: DateTime<Utc>,
}

impl CheckDueV1 {
    pub fn new(monitor_id: impl Into<String>, interval: CheckInterval, scheduled_for: DateTime<Utc>) -> Self {
        Self {
            schema_version: check_due_schema_version_v1(),
            monitor_id: monitor_id.into(),
            interval_secs: interval.as_secs(),
            scheduled_for,
            requested_at: Utc::now(),
        }
    }
}

pub fn check_due_schema_version_v1() -> String {
    "uptime_check_due_v1".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_schedule_entry_wire_format() {
        let entry: ScheduleEntry =
            serde_json::from_str(r#"{"interval":300,"lastUpdated":"2024-05-01T12:00:00Z"}"#).unwrap();
        assert_eq!(entry.interval(), Ok(CheckInterval::FiveMinutes));

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["interval"], 300);
        assert_eq!(json["lastUpdated"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_schedule_entry_with_unsupported_interval() {
        let entry: ScheduleEntry =
            serde_json::from_str(r#"{"interval":90,"lastUpdated":"2024-05-01T12:00:00Z"}"#).unwrap();
        assert_eq!(entry.interval(), Err(UnsupportedInterval(90)));
    }

    #[test]
    fn test_check_due_schema_version() {
        let due = CheckDueV1::new("m1", CheckInterval::OneMinute, Utc::now());
        assert_eq!(due.schema_version, "uptime_check_due_v1");
        assert_eq!(due.interval_secs, 60);
    }
}
