//! Collaborator interfaces for monitor configuration and alert/incident records.
//!
//! Each call is assumed to be transactional on its own; the state machine never
//! relies on multi-call atomicity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uptime_common::{Alert, Incident, Monitor, NewAlert, NewIncident, NotificationOutcome};

use crate::RepositoryError;

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

#[async_trait]
pub trait MonitorRepository: Send + Sync {
    async fn find_monitor_by_id(&self, monitor_id: &str) -> RepositoryResult<Option<Monitor>>;
}

#[async_trait]
pub trait AlertRepository: Send + Sync {
    /// Persists a new alert and assigns its identity.
    async fn create_alert(&self, alert: NewAlert) -> RepositoryResult<Alert>;

    async fn find_active_alerts(&self, monitor_id: &str) -> RepositoryResult<Vec<Alert>>;

    /// Sets `resolved_at` on every active alert of the monitor. Returns how many were resolved.
    async fn resolve_all_active_alerts(
        &self,
        monitor_id: &str,
        resolved_at: DateTime<Utc>,
    ) -> RepositoryResult<usize>;

    /// Most recent first.
    async fn find_recent_alerts(&self, monitor_id: &str, limit: usize) -> RepositoryResult<Vec<Alert>>;

    async fn record_notification_outcomes(
        &self,
        alert_id: &str,
        outcomes: BTreeMap<String, NotificationOutcome>,
    ) -> RepositoryResult<()>;
}

#[async_trait]
pub trait IncidentRepository: Send + Sync {
    async fn find_active_incident(&self, monitor_id: &str) -> RepositoryResult<Option<Incident>>;

    async fn create_incident(&self, incident: NewIncident) -> RepositoryResult<Incident>;

    async fn resolve_incident(
        &self,
        incident_id: &str,
        resolved_at: DateTime<Utc>,
    ) -> RepositoryResult<()>;
}
