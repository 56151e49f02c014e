//! In-memory monitor, alert and incident repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use uptime_common::{
    Alert, AlertType, Incident, IncidentStatus, Monitor, NewAlert, NewIncident, NotificationOutcome,
};
use uuid::Uuid;

use crate::repository::{AlertRepository, IncidentRepository, MonitorRepository, RepositoryResult};
use crate::RepositoryError;

#[derive(Default)]
pub struct InMemoryRepository {
    monitors: RwLock<HashMap<String, Monitor>>,
    /// Insertion order is creation order.
    alerts: RwLock<Vec<Alert>>,
    incidents: RwLock<Vec<Incident>>,
    unavailable: AtomicBool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_monitor(&self, monitor: Monitor) {
        self.monitors.write().insert(monitor.id.clone(), monitor);
    }

    pub fn remove_monitor(&self, monitor_id: &str) -> Option<Monitor> {
        self.monitors.write().remove(monitor_id)
    }

    /// Makes every call fail with `RepositoryError::Unavailable` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn alerts_for(&self, monitor_id: &str) -> Vec<Alert> {
        self.alerts
            .read()
            .iter()
            .filter(|a| a.monitor_id == monitor_id)
            .cloned()
            .collect()
    }

    pub fn alerts_of_type(&self, monitor_id: &str, alert_type: AlertType) -> Vec<Alert> {
        self.alerts_for(monitor_id)
            .into_iter()
            .filter(|a| a.alert_type == alert_type)
            .collect()
    }

    pub fn incidents_for(&self, monitor_id: &str) -> Vec<Incident> {
        self.incidents
            .read()
            .iter()
            .filter(|i| i.monitor_id == monitor_id)
            .cloned()
            .collect()
    }

    fn check_available(&self) -> RepositoryResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "in-memory repository marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MonitorRepository for InMemoryRepository {
    async fn find_monitor_by_id(&self, monitor_id: &str) -> RepositoryResult<Option<Monitor>> {
        self.check_available()?;
        Ok(self.monitors.read().get(monitor_id).cloned())
    }
}

#[async_trait]
impl AlertRepository for InMemoryRepository {
    async fn create_alert(&self, alert: NewAlert) -> RepositoryResult<Alert> {
        self.check_available()?;
        let alert = Alert {
            id: Uuid::new_v4().to_string(),
            monitor_id: alert.monitor_id,
            alert_type: alert.alert_type,
            severity: alert.severity,
            message: alert.message,
            triggered_at: alert.triggered_at,
            resolved_at: None,
            notifications: BTreeMap::new(),
        };
        self.alerts.write().push(alert.clone());
        Ok(alert)
    }

    async fn find_active_alerts(&self, monitor_id: &str) -> RepositoryResult<Vec<Alert>> {
        self.check_available()?;
        Ok(self
            .alerts
            .read()
            .iter()
            .filter(|a| a.monitor_id == monitor_id && a.is_active())
            .cloned()
            .collect())
    }

    async fn resolve_all_active_alerts(
        &self,
        monitor_id: &str,
        resolved_at: DateTime<Utc>,
    ) -> RepositoryResult<usize> {
        self.check_available()?;
        let mut resolved = 0;
        for alert in self.alerts.write().iter_mut() {
            if alert.monitor_id == monitor_id && alert.is_active() {
                alert.resolved_at = Some(resolved_at);
                resolved += 1;
            }
        }
        Ok(resolved)
    }

    async fn find_recent_alerts(&self, monitor_id: &str, limit: usize) -> RepositoryResult<Vec<Alert>> {
        self.check_available()?;
        Ok(self
            .alerts
            .read()
            .iter()
            .rev()
            .filter(|a| a.monitor_id == monitor_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn record_notification_outcomes(
        &self,
        alert_id: &str,
        outcomes: BTreeMap<String, NotificationOutcome>,
    ) -> RepositoryResult<()> {
        self.check_available()?;
        let mut alerts = self.alerts.write();
        let alert = alerts
            .iter_mut()
            .find(|a| a.id == alert_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("alert {}", alert_id)))?;
        alert.notifications.extend(outcomes);
        Ok(())
    }
}

#[async_trait]
impl IncidentRepository for InMemoryRepository {
    async fn find_active_incident(&self, monitor_id: &str) -> RepositoryResult<Option<Incident>> {
        self.check_available()?;
        Ok(self
            .incidents
            .read()
            .iter()
            .rev()
            .find(|i| i.monitor_id == monitor_id && i.is_active())
            .cloned())
    }

    async fn create_incident(&self, incident: NewIncident) -> RepositoryResult<Incident> {
        self.check_available()?;
        let incident = Incident {
            id: Uuid::new_v4().to_string(),
            monitor_id: incident.monitor_id,
            title: incident.title,
            root_cause: incident.root_cause,
            affected_locations: incident.affected_locations,
            status: IncidentStatus::Open,
            started_at: incident.started_at,
            resolved_at: None,
            alert_id: incident.alert_id,
        };
        self.incidents.write().push(incident.clone());
        Ok(incident)
    }

    async fn resolve_incident(
        &self,
        incident_id: &str,
        resolved_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        self.check_available()?;
        let mut incidents = self.incidents.write();
        let incident = incidents
            .iter_mut()
            .find(|i| i.id == incident_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("incident {}", incident_id)))?;
        incident.status = IncidentStatus::Resolved;
        incident.resolved_at = Some(resolved_at);
        Ok(())
    }
}
