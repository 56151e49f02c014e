use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Failure,
    Recovery,
    SslWarning,
    SslCritical,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Failure => "failure",
            AlertType::Recovery => "recovery",
            AlertType::SslWarning => "ssl_warning",
            AlertType::SslCritical => "ssl_critical",
        }
    }

    pub fn is_ssl(&self) -> bool {
        matches!(self, AlertType::SslWarning | AlertType::SslCritical)
    }

    pub fn default_severity(&self) -> AlertSeverity {
        match self {
            AlertType::Failure | AlertType::SslCritical => AlertSeverity::Critical,
            AlertType::SslWarning => AlertSeverity::Warning,
            AlertType::Recovery => AlertSeverity::Info,
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// Delivery outcome for one notification channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationOutcome {
    pub delivered: bool,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl NotificationOutcome {
    pub fn delivered(attempts: u32) -> Self {
        Self {
            delivered: true,
            attempts,
            error: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn failed(attempts: u32, error: impl Into<String>) -> Self {
        Self {
            delivered: false,
            attempts,
            error: Some(error.into()),
            recorded_at: Utc::now(),
        }
    }
}

/// An alert raised for a monitor. Active iff `resolved_at` is unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub monitor_id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Keyed by channel name.
    #[serde(default)]
    pub notifications: BTreeMap<String, NotificationOutcome>,
}

impl Alert {
    pub fn is_active(&self) -> bool {
        self.resolved_at.is_none()
    }
}

/// Fields supplied by the state machine when creating an alert; the repository
/// assigns the identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlert {
    pub monitor_id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
}

impl NewAlert {
    pub fn new(monitor_id: impl Into<String>, alert_type: AlertType, message: impl Into<String>) -> Self {
        Self {
            monitor_id: monitor_id.into(),
            alert_type,
            severity: alert_type.default_severity(),
            message: message.into(),
            triggered_at: Utc::now(),
        }
    }
}

/// Alert event published on the alert events channel for channel senders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEventV1 {
    pub schema_version: String,
    pub alert_id: String,
    pub monitor_id: String,
    pub monitor_name: String,
    pub monitor_url: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
}

pub fn alert_event_schema_version_v1() -> String {
    "uptime_alert_event_v1".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_alert_type_wire_names() {
        assert_eq!(serde_json::to_string(&AlertType::SslCritical).unwrap(), "\"ssl_critical\"");
        assert_eq!(AlertType::SslWarning.as_str(), "ssl_warning");
    }

    #[test]
    fn test_default_severity() {
        assert_eq!(AlertType::Failure.default_severity(), AlertSeverity::Critical);
        assert_eq!(AlertType::Recovery.default_severity(), AlertSeverity::Info);
        assert_eq!(AlertType::SslWarning.default_severity(), AlertSeverity::Warning);
    }
}
