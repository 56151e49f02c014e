use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uptime_common::CheckInterval;

/// One due tick of a scheduled monitor, handed to the [`CheckCallback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckTick {
    pub monitor_id: String,
    pub interval: CheckInterval,
    /// Cadence boundary this tick belongs to.
    pub scheduled_for: DateTime<Utc>,
}

/// Invoked by the scheduler each time a monitor is due.
///
/// Errors are logged by the scheduler and never cancel the job.
#[async_trait]
pub trait CheckCallback: Send + Sync {
    async fn on_fire(&self, tick: &CheckTick) -> anyhow::Result<()>;
}
