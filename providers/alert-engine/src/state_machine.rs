//! Alert State Machine
//!
//! Converts a stream of per-location check results into failure, recovery and
//! SSL-expiry alerts. Tracking state round-trips through the durable store at
//! `uptime:alert_state:{monitor_id}` so a restarted or second instance sees the
//! same progress. Results for one monitor are serialised in-process with a
//! keyed mutex; different monitors proceed in parallel.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use durable_store::{DurableStore, DurableStoreExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uptime_common::{
    alert_state_key, location_failure_key, ssl_alert_key, Alert, AlertTrackingState, AlertType,
    CheckResult, Monitor, NewAlert, NewIncident,
};

use crate::notify::NotificationDispatcher;
use crate::repository::{AlertRepository, IncidentRepository, MonitorRepository};
use crate::tracker::{
    apply_result, configured_locations, failure_alert_due, prune_locations, recovery_eligible,
};
use crate::{AlertEngineConfig, Result};

/// Recent alerts scanned for the last failure or recovery; SSL alerts in
/// between are skipped.
const RECOVERY_LOOKBACK: usize = 20;

/// What processing one check result did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOutcome {
    /// False when the monitor no longer exists; nothing else was touched.
    pub monitor_found: bool,
    pub consecutive_failures: u32,
    pub in_failure_state: bool,
    /// Alerts created by this result, in creation order.
    pub alerts: Vec<Alert>,
}

pub struct AlertStateMachine {
    config: AlertEngineConfig,
    store: Arc<dyn DurableStore>,
    monitors: Arc<dyn MonitorRepository>,
    alerts: Arc<dyn AlertRepository>,
    incidents: Arc<dyn IncidentRepository>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl AlertStateMachine {
    pub fn new(
        config: AlertEngineConfig,
        store: Arc<dyn DurableStore>,
        monitors: Arc<dyn MonitorRepository>,
        alerts: Arc<dyn AlertRepository>,
        incidents: Arc<dyn IncidentRepository>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            monitors,
            alerts,
            incidents,
            dispatcher,
            locks: DashMap::new(),
        })
    }

    pub fn config(&self) -> &AlertEngineConfig {
        &self.config
    }

    /// Current tracking state, zero-state when absent or expired.
    pub async fn tracking_state(&self, monitor_id: &str) -> Result<AlertTrackingState> {
        self.load_state(monitor_id).await
    }

    /// Processes one check result.
    ///
    /// Store and repository errors propagate to the caller for this result
    /// only. Notification problems never do.
    pub async fn process_check_result(&self, result: &CheckResult) -> Result<ProcessOutcome> {
        let lock = self.monitor_lock(&result.monitor_id);
        let processed = {
            let _guard = lock.lock().await;
            self.process_locked(result).await
        };
        drop(lock);
        self.release_monitor_lock(&result.monitor_id);
        processed
    }

    async fn process_locked(&self, result: &CheckResult) -> Result<ProcessOutcome> {
        let Some(monitor) = self.monitors.find_monitor_by_id(&result.monitor_id).await? else {
            warn!(
                monitor_id = %result.monitor_id,
                location = %result.location,
                "Monitor not found, dropping check result"
            );
            return Ok(ProcessOutcome::default());
        };

        let mut outcome = ProcessOutcome {
            monitor_found: true,
            ..Default::default()
        };

        if monitor.has_location(&result.location) {
            let state = self.track(&monitor, result, &mut outcome).await?;
            outcome.consecutive_failures = state.consecutive_failures;
            outcome.in_failure_state = state.is_in_failure_state;
        } else {
            warn!(
                monitor_id = %monitor.id,
                location = %result.location,
                "Result from a location the monitor is not configured for, skipping failure tracking"
            );
        }

        if let Some(alert) = self.evaluate_ssl(&monitor, result).await? {
            outcome.alerts.push(alert);
        }
        Ok(outcome)
    }

    async fn track(
        &self,
        monitor: &Monitor,
        result: &CheckResult,
        outcome: &mut ProcessOutcome,
    ) -> Result<AlertTrackingState> {
        let mode = self.config.trigger_mode;
        let locations = configured_locations(monitor);
        let mut state = self.load_state(&monitor.id).await?;
        prune_locations(&mut state, &locations);

        let counter_key = location_failure_key(&monitor.id, &result.location);
        if result.success {
            self.store.reset_counter(&counter_key).await?;
        } else {
            let count = self
                .store
                .increment_counter(&counter_key, self.config.alert_state_ttl())
                .await?;
            debug!(
                monitor_id = %monitor.id,
                location = %result.location,
                location_failures = count,
                "Recorded location failure"
            );
        }

        apply_result(&mut state, result, &locations, mode);
        self.save_state(&state).await?;

        let threshold = monitor.failure_threshold_or(self.config.default_failure_threshold);
        if failure_alert_due(&state, threshold, &locations, mode) {
            if let Some(alert) = self.raise_failure(monitor, &mut state, result).await? {
                outcome.alerts.push(alert);
            }
        } else if recovery_eligible(&state, result, mode) {
            if let Some(alert) = self.raise_recovery(monitor, &mut state).await? {
                outcome.alerts.push(alert);
            }
        }
        Ok(state)
    }

    async fn raise_failure(
        &self,
        monitor: &Monitor,
        state: &mut AlertTrackingState,
        result: &CheckResult,
    ) -> Result<Option<Alert>> {
        let active = self.alerts.find_active_alerts(&monitor.id).await?;
        if let Some(existing) = active.iter().find(|a| a.alert_type == AlertType::Failure) {
            info!(
                monitor_id = %monitor.id,
                alert_id = %existing.id,
                "Failure alert already active, not raising another"
            );
            state.is_in_failure_state = true;
            state.record_alert(&existing.id, AlertType::Failure, existing.triggered_at);
            self.save_state(state).await?;
            return Ok(None);
        }

        let cause = root_cause(result, &state.failing_locations);
        let alert = self
            .alerts
            .create_alert(NewAlert::new(
                monitor.id.clone(),
                AlertType::Failure,
                format!("{} is down ({})", display_name(monitor), cause),
            ))
            .await?;

        state.is_in_failure_state = true;
        state.record_alert(&alert.id, AlertType::Failure, alert.triggered_at);
        self.save_state(state).await?;

        info!(
            monitor_id = %monitor.id,
            alert_id = %alert.id,
            consecutive_failures = state.consecutive_failures,
            "Failure alert raised"
        );

        self.notify(&alert, monitor).await;

        if self.config.create_incidents {
            self.open_incident(monitor, state, &alert, cause).await?;
        }
        Ok(Some(alert))
    }

    async fn raise_recovery(
        &self,
        monitor: &Monitor,
        state: &mut AlertTrackingState,
    ) -> Result<Option<Alert>> {
        let recent = self
            .alerts
            .find_recent_alerts(&monitor.id, RECOVERY_LOOKBACK)
            .await?;
        let last_transition = recent
            .iter()
            .find(|a| matches!(a.alert_type, AlertType::Failure | AlertType::Recovery));
        if last_transition.map_or(false, |a| a.alert_type == AlertType::Recovery) {
            info!(
                monitor_id = %monitor.id,
                "Last failure or recovery alert is already a recovery, resetting tracking state only"
            );
            state.clear_failures();
            self.save_state(state).await?;
            return Ok(None);
        }

        let alert = self
            .alerts
            .create_alert(NewAlert::new(
                monitor.id.clone(),
                AlertType::Recovery,
                format!("{} has recovered", display_name(monitor)),
            ))
            .await?;

        let resolved = self
            .alerts
            .resolve_all_active_alerts(&monitor.id, alert.triggered_at)
            .await?;

        state.clear_failures();
        state.record_alert(&alert.id, AlertType::Recovery, alert.triggered_at);
        self.save_state(state).await?;

        info!(
            monitor_id = %monitor.id,
            alert_id = %alert.id,
            resolved_alerts = resolved,
            "Recovery alert raised"
        );

        self.notify(&alert, monitor).await;

        if let Some(incident) = self.incidents.find_active_incident(&monitor.id).await? {
            self.incidents
                .resolve_incident(&incident.id, alert.triggered_at)
                .await?;
            info!(monitor_id = %monitor.id, incident_id = %incident.id, "Incident resolved");
        }
        Ok(Some(alert))
    }

    async fn open_incident(
        &self,
        monitor: &Monitor,
        state: &AlertTrackingState,
        alert: &Alert,
        root_cause: String,
    ) -> Result<()> {
        if let Some(existing) = self.incidents.find_active_incident(&monitor.id).await? {
            debug!(
                monitor_id = %monitor.id,
                incident_id = %existing.id,
                "Incident already open"
            );
            return Ok(());
        }

        let incident = self
            .incidents
            .create_incident(NewIncident {
                monitor_id: monitor.id.clone(),
                title: format!("{} is down", display_name(monitor)),
                root_cause,
                affected_locations: state.failing_locations.iter().cloned().collect(),
                started_at: alert.triggered_at,
                alert_id: Some(alert.id.clone()),
            })
            .await?;
        info!(monitor_id = %monitor.id, incident_id = %incident.id, "Incident opened");
        Ok(())
    }

    async fn evaluate_ssl(&self, monitor: &Monitor, result: &CheckResult) -> Result<Option<Alert>> {
        let Some(expires_at) = result.ssl_expires_at else {
            return Ok(None);
        };
        let days = (expires_at - result.timestamp).num_days();
        let Some(alert_type) = classify_ssl_expiry(days, &self.config) else {
            return Ok(None);
        };

        let key = ssl_alert_key(&monitor.id, alert_type.as_str());
        let claimed = self
            .store
            .set_if_absent(&key, &result.timestamp.to_rfc3339(), self.config.ssl_alert_window())
            .await?;
        if !claimed {
            debug!(
                monitor_id = %monitor.id,
                alert_type = %alert_type,
                "SSL alert already raised within window"
            );
            return Ok(None);
        }

        let message = ssl_message(monitor, days, expires_at);
        let alert = match self
            .alerts
            .create_alert(NewAlert::new(monitor.id.clone(), alert_type, message))
            .await
        {
            Ok(alert) => alert,
            Err(e) => {
                // Release the window so the next check can retry.
                if let Err(release) = self.store.delete(&key).await {
                    warn!(monitor_id = %monitor.id, "Failed to release SSL alert marker: {}", release);
                }
                return Err(e.into());
            }
        };

        info!(
            monitor_id = %monitor.id,
            alert_id = %alert.id,
            alert_type = %alert_type,
            days_until_expiry = days,
            "SSL alert raised"
        );
        self.notify(&alert, monitor).await;
        Ok(Some(alert))
    }

    async fn notify(&self, alert: &Alert, monitor: &Monitor) {
        let outcomes = self.dispatcher.dispatch(alert, monitor).await;
        if outcomes.is_empty() {
            return;
        }

        let failed: Vec<&str> = outcomes
            .iter()
            .filter(|(_, o)| !o.delivered)
            .map(|(channel, _)| channel.as_str())
            .collect();
        if !failed.is_empty() {
            warn!(
                alert_id = %alert.id,
                channels = ?failed,
                "Notification delivery failed"
            );
        }

        if let Err(e) = self
            .alerts
            .record_notification_outcomes(&alert.id, outcomes)
            .await
        {
            warn!(alert_id = %alert.id, "Failed to record notification outcomes: {}", e);
        }
    }

    async fn load_state(&self, monitor_id: &str) -> Result<AlertTrackingState> {
        let key = alert_state_key(monitor_id);
        match self.store.get_json::<AlertTrackingState>(&key).await {
            Ok(Some(state)) => Ok(state),
            Ok(None) => Ok(AlertTrackingState::new(monitor_id)),
            Err(durable_store::StoreError::Serialization(e)) => {
                warn!(monitor_id = %monitor_id, "Discarding unreadable tracking state: {}", e);
                Ok(AlertTrackingState::new(monitor_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save_state(&self, state: &AlertTrackingState) -> Result<()> {
        self.store
            .set_json(
                &alert_state_key(&state.monitor_id),
                state,
                Some(self.config.alert_state_ttl()),
            )
            .await?;
        Ok(())
    }

    fn monitor_lock(&self, monitor_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(monitor_id.to_string())
            .or_default()
            .clone()
    }

    /// Drops the monitor's lock entry once no other caller holds or waits on it.
    fn release_monitor_lock(&self, monitor_id: &str) {
        self.locks
            .remove_if(monitor_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Critical takes precedence over warning.
pub fn classify_ssl_expiry(days_until_expiry: i64, config: &AlertEngineConfig) -> Option<AlertType> {
    if days_until_expiry <= config.ssl_critical_days {
        Some(AlertType::SslCritical)
    } else if days_until_expiry <= config.ssl_warning_days {
        Some(AlertType::SslWarning)
    } else {
        None
    }
}

fn display_name(monitor: &Monitor) -> &str {
    if monitor.name.is_empty() {
        &monitor.url
    } else {
        &monitor.name
    }
}

fn root_cause(result: &CheckResult, failing_locations: &BTreeSet<String>) -> String {
    let mut parts = Vec::new();
    if let Some(error) = &result.error {
        parts.push(format!("error: {}", error));
    }
    if let Some(code) = result.status_code {
        parts.push(format!("status code: {}", code));
    }
    if let Some(ip) = &result.resolved_ip {
        parts.push(format!("resolved IP: {}", ip));
    }
    if !failing_locations.is_empty() {
        let locations: Vec<&str> = failing_locations.iter().map(String::as_str).collect();
        parts.push(format!("affected locations: {}", locations.join(", ")));
    }
    if parts.is_empty() {
        "check failed".to_string()
    } else {
        parts.join("; ")
    }
}

fn ssl_message(monitor: &Monitor, days: i64, expires_at: DateTime<Utc>) -> String {
    let date = expires_at.format("%Y-%m-%d");
    if days < 0 {
        format!(
            "SSL certificate for {} expired {} days ago ({})",
            display_name(monitor),
            -days,
            date
        )
    } else {
        format!(
            "SSL certificate for {} expires in {} days ({})",
            display_name(monitor),
            days,
            date
        )
    }
}
