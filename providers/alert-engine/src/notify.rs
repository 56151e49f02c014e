//! Notification dispatch.
//!
//! The state machine decides that an alert must go out and with what content;
//! a [`NotificationDispatcher`] decides how. Dispatch is best-effort: delivery
//! problems are reported as per-channel outcomes, never as errors.

use async_trait::async_trait;
use durable_store::DurableStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use uptime_common::{alert_event_schema_version_v1, Alert, AlertEventV1, Monitor, NotificationOutcome};

use crate::retry::{retry_with_backoff, RetryConfig};

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Fans the alert out to its channels. Keyed by channel name.
    async fn dispatch(&self, alert: &Alert, monitor: &Monitor) -> BTreeMap<String, NotificationOutcome>;
}

pub const PUBSUB_CHANNEL_NAME: &str = "pubsub";

/// Publishes an [`AlertEventV1`] on a durable-store channel for the channel
/// senders (email, webhook, SMS) to pick up.
pub struct PubSubDispatcher {
    store: Arc<dyn DurableStore>,
    channel: String,
    retry: RetryConfig,
}

impl PubSubDispatcher {
    pub fn new(store: Arc<dyn DurableStore>, channel: impl Into<String>, retry: RetryConfig) -> Self {
        Self {
            store,
            channel: channel.into(),
            retry,
        }
    }
}

#[async_trait]
impl NotificationDispatcher for PubSubDispatcher {
    async fn dispatch(&self, alert: &Alert, monitor: &Monitor) -> BTreeMap<String, NotificationOutcome> {
        let event = AlertEventV1 {
            schema_version: alert_event_schema_version_v1(),
            alert_id: alert.id.clone(),
            monitor_id: alert.monitor_id.clone(),
            monitor_name: monitor.name.clone(),
            monitor_url: monitor.url.clone(),
            alert_type: alert.alert_type,
            severity: alert.severity,
            message: alert.message.clone(),
            triggered_at: alert.triggered_at,
        };

        let outcome = match serde_json::to_string(&event) {
            Ok(payload) => {
                let (result, attempts) = retry_with_backoff(&self.retry, || {
                    self.store.publish(&self.channel, &payload)
                })
                .await;
                match result {
                    Ok(()) => {
                        info!(
                            alert_id = %alert.id,
                            alert_type = %alert.alert_type,
                            channel = %self.channel,
                            "Alert event published"
                        );
                        NotificationOutcome::delivered(attempts)
                    }
                    Err(e) => {
                        warn!(alert_id = %alert.id, "Alert event publish failed: {}", e);
                        NotificationOutcome::failed(attempts, e.to_string())
                    }
                }
            }
            Err(e) => NotificationOutcome::failed(0, format!("failed to encode alert event: {}", e)),
        };

        let mut outcomes = BTreeMap::new();
        outcomes.insert(PUBSUB_CHANNEL_NAME.to_string(), outcome);
        outcomes
    }
}

/// Dispatcher that sends nothing and reports no channels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDispatcher;

#[async_trait]
impl NotificationDispatcher for NoopDispatcher {
    async fn dispatch(&self, _alert: &Alert, _monitor: &Monitor) -> BTreeMap<String, NotificationOutcome> {
        BTreeMap::new()
    }
}
