use async_trait::async_trait;
use durable_store::{DurableStore, DurableStoreExt};
use std::sync::Arc;
use tracing::debug;
use uptime_common::CheckDueV1;

use crate::{CheckCallback, CheckTick};

/// Callback that announces each due check on a pub/sub channel for external
/// probe workers.
pub struct DueCheckPublisher {
    store: Arc<dyn DurableStore>,
    channel: String,
}

impl DueCheckPublisher {
    pub fn new(store: Arc<dyn DurableStore>, channel: impl Into<String>) -> Self {
        Self {
            store,
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl CheckCallback for DueCheckPublisher {
    async fn on_fire(&self, tick: &CheckTick) -> anyhow::Result<()> {
        let message = CheckDueV1::new(tick.monitor_id.clone(), tick.interval, tick.scheduled_for);
        self.store.publish_json(&self.channel, &message).await?;
        debug!(monitor_id = %tick.monitor_id, channel = %self.channel, "Published due check");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use durable_store::MemoryStore;
    use uptime_common::{CheckInterval, CHECKS_DUE_CHANNEL};

    #[tokio::test]
    async fn test_publishes_check_due_message() {
        let store = Arc::new(MemoryStore::new());
        let publisher = DueCheckPublisher::new(store.clone(), CHECKS_DUE_CHANNEL);
        let scheduled_for = Utc::now();

        publisher
            .on_fire(&CheckTick {
                monitor_id: "m1".to_string(),
                interval: CheckInterval::FiveMinutes,
                scheduled_for,
            })
            .await
            .unwrap();

        let messages = store.published_on(CHECKS_DUE_CHANNEL);
        assert_eq!(messages.len(), 1);
        let due: CheckDueV1 = serde_json::from_str(&messages[0]).unwrap();
        assert_eq!(due.monitor_id, "m1");
        assert_eq!(due.interval_secs, 300);
        assert_eq!(due.scheduled_for, scheduled_for);
    }

    #[tokio::test]
    async fn test_store_failure_is_returned() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let publisher = DueCheckPublisher::new(store, CHECKS_DUE_CHANNEL);

        let result = publisher
            .on_fire(&CheckTick {
                monitor_id: "m1".to_string(),
                interval: CheckInterval::OneMinute,
                scheduled_for: Utc::now(),
            })
            .await;
        assert!(result.is_err());
    }
}
