use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one probe of one monitor from one location.
///
/// Produced by the check executor, immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub monitor_id: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_expires_at: Option<DateTime<Utc>>,
}

impl CheckResult {
    pub fn success(monitor_id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            monitor_id: monitor_id.into(),
            location: location.into(),
            timestamp: Utc::now(),
            success: true,
            response_time_ms: None,
            status_code: None,
            error: None,
            resolved_ip: None,
            ssl_expires_at: None,
        }
    }

    pub fn failure(
        monitor_id: impl Into<String>,
        location: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::success(monitor_id, location)
        }
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_response_time(mut self, response_time_ms: u64) -> Self {
        self.response_time_ms = Some(response_time_ms);
        self
    }

    pub fn with_resolved_ip(mut self, ip: impl Into<String>) -> Self {
        self.resolved_ip = Some(ip.into());
        self
    }

    pub fn with_ssl_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.ssl_expires_at = Some(expires_at);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
