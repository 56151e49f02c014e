//! Restart-resilient recurring check scheduler.
//!
//! The durable store holds the schedule table (`uptime:schedule:{monitor_id}`);
//! the in-process job map is an index of live timer handles derived from it.
//! All mutations of the job map and the schedule table are serialised by one
//! async mutex, which also guards the lifecycle state so no job can be
//! registered once `stop()` has begun.

use chrono::{DateTime, Utc};
use durable_store::{DurableStore, DurableStoreExt};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, error, info, warn};
use uptime_common::{
    monitor_id_from_schedule_key, schedule_key, CheckInterval, ScheduleEntry, SCHEDULE_KEY_PATTERN,
};
use uuid::Uuid;

use crate::cadence::next_fire_after;
use crate::job::{spawn_job, JobHandle, JobParams};
use crate::{CheckCallback, Result, SchedulerConfig, SchedulerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Created,
    Started,
    /// Terminal. A new `Scheduler` is required to schedule again.
    Stopped,
}

/// Observability snapshot of one live job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledCheck {
    pub monitor_id: String,
    pub interval: CheckInterval,
    pub next_fire_at: DateTime<Utc>,
    pub running: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    /// Live jobs whose missing schedule entry was written.
    pub persisted: usize,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.removed == 0 && self.persisted == 0
    }
}

struct Inner {
    state: SchedulerState,
    jobs: HashMap<String, JobHandle>,
}

pub struct Scheduler {
    config: SchedulerConfig,
    store: Arc<dyn DurableStore>,
    callback: Arc<dyn CheckCallback>,
    permits: Arc<Semaphore>,
    instance_id: Arc<str>,
    inner: Mutex<Inner>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn DurableStore>,
        callback: Arc<dyn CheckCallback>,
    ) -> Result<Self> {
        config.validate()?;
        let permits = Arc::new(Semaphore::new(config.max_concurrent_checks));
        Ok(Self {
            config,
            store,
            callback,
            permits,
            instance_id: Arc::from(Uuid::new_v4().to_string()),
            inner: Mutex::new(Inner {
                state: SchedulerState::Created,
                jobs: HashMap::new(),
            }),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub async fn state(&self) -> SchedulerState {
        self.inner.lock().await.state
    }

    /// Transitions to `Started` and, with persistence enabled, restores every
    /// valid persisted schedule entry. Returns the number of restored jobs.
    pub async fn start(&self) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            SchedulerState::Created => {}
            SchedulerState::Started => return Err(SchedulerError::AlreadyStarted),
            SchedulerState::Stopped => return Err(SchedulerError::Stopped),
        }
        inner.state = SchedulerState::Started;

        if !self.config.persistence_enabled {
            info!(instance_id = %self.instance_id, "Scheduler started (persistence disabled)");
            return Ok(0);
        }

        let persisted = match self.load_persisted().await {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!("Failed to restore persisted schedules, starting empty: {}", e);
                return Ok(0);
            }
        };

        let mut restored = 0;
        for (monitor_id, interval) in persisted.valid {
            match self.register(&mut inner, &monitor_id, interval, false).await {
                Ok(()) => restored += 1,
                Err(e) => warn!(monitor_id = %monitor_id, "Failed to restore schedule: {}", e),
            }
        }

        info!(
            instance_id = %self.instance_id,
            restored,
            skipped = persisted.invalid,
            "Scheduler started"
        );
        Ok(restored)
    }

    /// Registers (or replaces) the recurring job for a monitor and persists
    /// its schedule entry.
    pub async fn schedule_check(&self, monitor_id: &str, interval: CheckInterval) -> Result<()> {
        let mut inner = self.inner.lock().await;
        ensure_started(inner.state)?;
        self.register(&mut inner, monitor_id, interval, true).await
    }

    /// Same as [`Scheduler::schedule_check`] for a raw interval in seconds.
    /// Unsupported values are rejected, never coerced.
    pub async fn schedule_check_secs(&self, monitor_id: &str, interval_secs: u64) -> Result<()> {
        let interval = CheckInterval::try_from(interval_secs)?;
        self.schedule_check(monitor_id, interval).await
    }

    /// Stops and removes the job and its persisted entry. Unknown monitors are a no-op.
    pub async fn cancel_check(&self, monitor_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(handle) = inner.jobs.remove(monitor_id) {
            handle.cancel().await;
            info!(monitor_id = %monitor_id, "Cancelled scheduled check");
        }

        if self.config.persistence_enabled {
            if let Err(e) = self.store.delete(&schedule_key(monitor_id)).await {
                warn!(monitor_id = %monitor_id, "Failed to delete persisted schedule: {}", e);
            }
        }
        Ok(())
    }

    /// No-op when the monitor already runs at `interval`.
    pub async fn update_schedule(&self, monitor_id: &str, interval: CheckInterval) -> Result<()> {
        let mut inner = self.inner.lock().await;
        ensure_started(inner.state)?;
        if inner
            .jobs
            .get(monitor_id)
            .map_or(false, |job| job.interval == interval)
        {
            debug!(monitor_id = %monitor_id, interval = %interval, "Schedule unchanged");
            return Ok(());
        }
        self.register(&mut inner, monitor_id, interval, true).await
    }

    /// Brings live jobs in line with the persisted schedule table: missing
    /// jobs are added, changed cadences re-created and jobs whose entry
    /// disappeared are cancelled. Existing entries are never rewritten; a job
    /// whose own entry write failed gets that entry written instead of being
    /// cancelled.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let mut inner = self.inner.lock().await;
        ensure_started(inner.state)?;
        if !self.config.persistence_enabled {
            return Ok(ReconcileReport::default());
        }

        let mut persisted = self.load_persisted().await?;
        let mut report = ReconcileReport::default();

        // Jobs whose entry write failed are kept and their entry written now.
        let unpersisted: Vec<(String, CheckInterval)> = inner
            .jobs
            .iter()
            .filter(|(_, job)| !job.persisted)
            .map(|(id, job)| (id.clone(), job.interval))
            .collect();
        for (monitor_id, interval) in unpersisted {
            if !persisted.present.contains(&monitor_id) {
                let entry = ScheduleEntry::new(interval);
                if let Err(e) = self
                    .store
                    .set_json(&schedule_key(&monitor_id), &entry, None)
                    .await
                {
                    warn!(
                        monitor_id = %monitor_id,
                        "Schedule entry still not persisted, keeping job: {}",
                        e
                    );
                    continue;
                }
                persisted.present.insert(monitor_id.clone());
                persisted.valid.insert(monitor_id.clone(), interval);
                report.persisted += 1;
            }
            if let Some(job) = inner.jobs.get_mut(&monitor_id) {
                job.persisted = true;
            }
        }

        for (monitor_id, interval) in &persisted.valid {
            let current = inner.jobs.get(monitor_id).map(|job| job.interval);
            match current {
                Some(live) if live == *interval => {}
                Some(_) => {
                    self.register(&mut inner, monitor_id, *interval, false).await?;
                    report.updated += 1;
                }
                None => {
                    self.register(&mut inner, monitor_id, *interval, false).await?;
                    report.added += 1;
                }
            }
        }

        let orphaned: Vec<String> = inner
            .jobs
            .iter()
            .filter(|(id, job)| job.persisted && !persisted.present.contains(*id))
            .map(|(id, _)| id.clone())
            .collect();
        for monitor_id in orphaned {
            if let Some(handle) = inner.jobs.remove(&monitor_id) {
                handle.cancel().await;
                report.removed += 1;
            }
        }

        if !report.is_empty() {
            info!(
                added = report.added,
                updated = report.updated,
                removed = report.removed,
                persisted = report.persisted,
                "Reconciled schedules"
            );
        }
        Ok(report)
    }

    /// Snapshot of live jobs with freshly computed next-fire times, ordered by monitor id.
    pub async fn get_scheduled_checks(&self) -> Vec<ScheduledCheck> {
        let inner = self.inner.lock().await;
        let now = Utc::now();
        let mut checks: Vec<ScheduledCheck> = inner
            .jobs
            .iter()
            .filter_map(|(monitor_id, job)| {
                let next_fire_at = next_fire_after(job.interval, now).ok()?;
                Some(ScheduledCheck {
                    monitor_id: monitor_id.clone(),
                    interval: job.interval,
                    next_fire_at,
                    running: job.is_running(),
                })
            })
            .collect();
        checks.sort_by(|a, b| a.monitor_id.cmp(&b.monitor_id));
        checks
    }

    pub async fn is_scheduled(&self, monitor_id: &str) -> bool {
        self.inner.lock().await.jobs.contains_key(monitor_id)
    }

    pub async fn job_count(&self) -> usize {
        self.inner.lock().await.jobs.len()
    }

    /// Stops all timers, then waits up to the overlap timeout for running
    /// callbacks. Returns how many callbacks were still running when the wait
    /// gave up. Persisted entries are kept for the next start.
    pub async fn stop(&self) -> usize {
        {
            let mut inner = self.inner.lock().await;
            if inner.state == SchedulerState::Stopped {
                return 0;
            }
            inner.state = SchedulerState::Stopped;
            let jobs: Vec<(String, JobHandle)> = inner.jobs.drain().collect();
            let cancelled = jobs.len();
            for (_, handle) in jobs {
                handle.cancel().await;
            }
            info!(cancelled, "Scheduler stopping, timers cancelled");
        }

        let max = u32::try_from(self.config.max_concurrent_checks).unwrap_or(u32::MAX);
        let timeout = self.config.overlap_timeout();
        match tokio::time::timeout(timeout, self.permits.acquire_many(max)).await {
            Ok(Ok(_all)) => {
                info!("Scheduler stopped");
                0
            }
            Ok(Err(e)) => {
                error!("Concurrency semaphore closed during stop: {}", e);
                0
            }
            Err(_) => {
                let abandoned = self
                    .config
                    .max_concurrent_checks
                    .saturating_sub(self.permits.available_permits());
                warn!(
                    abandoned,
                    timeout_ms = self.config.overlap_timeout_ms,
                    "Stop timed out, abandoning running checks"
                );
                abandoned
            }
        }
    }

    async fn register(
        &self,
        inner: &mut Inner,
        monitor_id: &str,
        interval: CheckInterval,
        persist: bool,
    ) -> Result<()> {
        let first_fire = next_fire_after(interval, Utc::now())?;

        // The old timer must be fully gone before the new one is armed.
        if let Some(existing) = inner.jobs.remove(monitor_id) {
            existing.cancel().await;
            debug!(monitor_id = %monitor_id, "Replaced existing job");
        }

        let mut handle = spawn_job(JobParams {
            monitor_id: monitor_id.to_string(),
            interval,
            first_fire,
            callback: self.callback.clone(),
            store: self.store.clone(),
            permits: self.permits.clone(),
            fire_lock: self.config.distributed_fire_lock,
            instance_id: self.instance_id.clone(),
        });

        info!(
            monitor_id = %monitor_id,
            interval = %interval,
            next_fire_at = %first_fire,
            "Scheduled check"
        );

        if persist && self.config.persistence_enabled {
            let entry = ScheduleEntry::new(interval);
            if let Err(e) = self
                .store
                .set_json(&schedule_key(monitor_id), &entry, None)
                .await
            {
                warn!(monitor_id = %monitor_id, "Failed to persist schedule entry: {}", e);
                handle.persisted = false;
            }
        }
        inner.jobs.insert(monitor_id.to_string(), handle);
        Ok(())
    }

    async fn load_persisted(&self) -> Result<PersistedSchedules> {
        let keys = self.store.keys(SCHEDULE_KEY_PATTERN).await?;
        let mut persisted = PersistedSchedules::default();

        for key in keys {
            let Some(monitor_id) = monitor_id_from_schedule_key(&key) else {
                continue;
            };
            persisted.present.insert(monitor_id.to_string());

            let entry = match self.store.get_json::<ScheduleEntry>(&key).await {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    warn!(monitor_id = %monitor_id, "Skipping unreadable schedule entry: {}", e);
                    persisted.invalid += 1;
                    continue;
                }
            };
            match entry.interval() {
                Ok(interval) => {
                    persisted.valid.insert(monitor_id.to_string(), interval);
                }
                Err(e) => {
                    warn!(monitor_id = %monitor_id, "Skipping schedule entry: {}", e);
                    persisted.invalid += 1;
                }
            }
        }
        Ok(persisted)
    }
}

#[derive(Default)]
struct PersistedSchedules {
    valid: BTreeMap<String, CheckInterval>,
    /// Every monitor with an entry, valid or not.
    present: BTreeSet<String>,
    invalid: usize,
}

fn ensure_started(state: SchedulerState) -> Result<()> {
    match state {
        SchedulerState::Started => Ok(()),
        SchedulerState::Created => Err(SchedulerError::NotStarted),
        SchedulerState::Stopped => Err(SchedulerError::Stopped),
    }
}
