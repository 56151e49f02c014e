//! Per-monitor timer task.
//!
//! Each scheduled monitor owns one timer task. On every tick the task applies
//! the non-overlap and concurrency guards synchronously, then spawns the
//! callback so a slow check never delays the timer.

use chrono::{DateTime, Utc};
use durable_store::DurableStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uptime_common::{fire_lock_key, CheckInterval};

use crate::{CheckCallback, CheckTick};

/// Live handle to a monitor's timer task.
pub(crate) struct JobHandle {
    pub interval: CheckInterval,
    pub running: Arc<AtomicBool>,
    /// False while the schedule entry for this job is missing from the store
    /// because the write failed.
    pub persisted: bool,
    task: JoinHandle<()>,
}

impl JobHandle {
    /// Aborts the timer and waits until it is gone, so no further tick of this
    /// job can fire. A callback already in flight keeps running.
    pub async fn cancel(self) {
        self.task.abort();
        let _ = self.task.await;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

pub(crate) struct JobParams {
    pub monitor_id: String,
    pub interval: CheckInterval,
    pub first_fire: DateTime<Utc>,
    pub callback: Arc<dyn CheckCallback>,
    pub store: Arc<dyn DurableStore>,
    pub permits: Arc<Semaphore>,
    pub fire_lock: bool,
    pub instance_id: Arc<str>,
}

pub(crate) fn spawn_job(params: JobParams) -> JobHandle {
    let interval = params.interval;
    let running = Arc::new(AtomicBool::new(false));
    let job = Job {
        params,
        running: running.clone(),
    };
    let task = tokio::spawn(job.run());
    JobHandle {
        interval,
        running,
        persisted: true,
        task,
    }
}

struct Job {
    params: JobParams,
    running: Arc<AtomicBool>,
}

impl Job {
    async fn run(self) {
        let period = self.params.interval.as_duration();
        let delay = (self.params.first_fire - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let start = Instant::now() + delay;

        // Skip keeps later ticks on multiples of `period` from `start`, so the
        // wall-clock alignment of the first tick carries through.
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        debug!(
            monitor_id = %self.params.monitor_id,
            interval = %self.params.interval,
            first_fire = %self.params.first_fire,
            "Timer armed"
        );

        loop {
            let tick_at = ticker.tick().await;
            let offset = chrono::Duration::from_std(tick_at.duration_since(start))
                .unwrap_or_else(|_| chrono::Duration::zero());
            self.fire(self.params.first_fire + offset);
        }
    }

    fn fire(&self, scheduled_for: DateTime<Utc>) {
        let monitor_id = &self.params.monitor_id;

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(
                monitor_id = %monitor_id,
                scheduled_for = %scheduled_for,
                "Previous check still running, skipping tick"
            );
            return;
        }
        let guard = RunningGuard(self.running.clone());

        let permit = match self.params.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    monitor_id = %monitor_id,
                    scheduled_for = %scheduled_for,
                    "Concurrency ceiling reached, skipping tick"
                );
                return;
            }
        };

        let tick = CheckTick {
            monitor_id: monitor_id.clone(),
            interval: self.params.interval,
            scheduled_for,
        };
        let callback = self.params.callback.clone();
        let store = self.params.store.clone();
        let fire_lock = self.params.fire_lock;
        let instance_id = self.params.instance_id.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let _guard = guard;

            if fire_lock && !claim_tick(store.as_ref(), &tick, &instance_id).await {
                return;
            }

            debug!(monitor_id = %tick.monitor_id, scheduled_for = %tick.scheduled_for, "Firing check");
            if let Err(e) = callback.on_fire(&tick).await {
                error!(
                    monitor_id = %tick.monitor_id,
                    scheduled_for = %tick.scheduled_for,
                    "Check callback failed: {:#}",
                    e
                );
            }
        });
    }
}

/// Returns false when another instance already fired this tick. Store errors
/// fall through to firing.
async fn claim_tick(store: &dyn DurableStore, tick: &CheckTick, instance_id: &str) -> bool {
    let key = fire_lock_key(&tick.monitor_id, tick.scheduled_for.timestamp());
    match store
        .set_if_absent(&key, instance_id, tick.interval.as_duration())
        .await
    {
        Ok(true) => true,
        Ok(false) => {
            info!(
                monitor_id = %tick.monitor_id,
                scheduled_for = %tick.scheduled_for,
                "Tick already fired by another scheduler instance, skipping"
            );
            false
        }
        Err(e) => {
            warn!(
                monitor_id = %tick.monitor_id,
                "Fire lock unavailable, firing anyway: {}",
                e
            );
            true
        }
    }
}

/// Clears the per-monitor running flag when the execution ends, including on panic.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
