//! Check-cycle runner.
//!
//! Bridges the scheduler callback to the alert state machine: one tick runs
//! the executor for every configured location concurrently, then feeds the
//! results to the state machine one at a time.

use anyhow::anyhow;
use async_trait::async_trait;
use check_scheduler::{CheckCallback, CheckTick};
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uptime_common::{CheckResult, Monitor};

use crate::repository::MonitorRepository;
use crate::state_machine::AlertStateMachine;
use crate::Result;

/// Performs the network probe of one monitor from one location.
#[async_trait]
pub trait CheckExecutor: Send + Sync {
    async fn execute(&self, monitor: &Monitor, location: &str) -> anyhow::Result<CheckResult>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub monitor_found: bool,
    /// Results handed to the state machine.
    pub processed: usize,
    /// Results the state machine rejected with an error.
    pub failed: usize,
    /// Locations for which the executor produced no result.
    pub executor_errors: usize,
}

pub struct CheckCycleRunner {
    monitors: Arc<dyn MonitorRepository>,
    executor: Arc<dyn CheckExecutor>,
    machine: Arc<AlertStateMachine>,
}

impl CheckCycleRunner {
    pub fn new(
        monitors: Arc<dyn MonitorRepository>,
        executor: Arc<dyn CheckExecutor>,
        machine: Arc<AlertStateMachine>,
    ) -> Self {
        Self {
            monitors,
            executor,
            machine,
        }
    }

    /// Runs one check cycle for a monitor.
    ///
    /// Only the monitor lookup can fail the whole cycle. Executor errors skip
    /// their location; state-machine errors are logged and counted.
    pub async fn run_cycle(&self, monitor_id: &str) -> Result<CycleSummary> {
        let Some(monitor) = self.monitors.find_monitor_by_id(monitor_id).await? else {
            warn!(monitor_id = %monitor_id, "Monitor not found, skipping check cycle");
            return Ok(CycleSummary::default());
        };

        let locations: BTreeSet<&str> = monitor.probe_locations.iter().map(String::as_str).collect();
        let probes = locations.iter().map(|location| {
            let monitor = &monitor;
            let executor = &self.executor;
            async move { (*location, executor.execute(monitor, location).await) }
        });
        let outcomes = join_all(probes).await;

        let mut summary = CycleSummary {
            monitor_found: true,
            ..Default::default()
        };

        for (location, outcome) in outcomes {
            let result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    warn!(
                        monitor_id = %monitor.id,
                        location = %location,
                        "Check executor failed, skipping location: {:#}",
                        e
                    );
                    summary.executor_errors += 1;
                    continue;
                }
            };

            summary.processed += 1;
            if let Err(e) = self.machine.process_check_result(&result).await {
                error!(
                    monitor_id = %monitor.id,
                    location = %location,
                    retryable = e.is_retryable(),
                    "Failed to process check result: {}",
                    e
                );
                summary.failed += 1;
            }
        }

        debug!(
            monitor_id = %monitor.id,
            processed = summary.processed,
            failed = summary.failed,
            executor_errors = summary.executor_errors,
            "Check cycle complete"
        );
        Ok(summary)
    }
}

#[async_trait]
impl CheckCallback for CheckCycleRunner {
    async fn on_fire(&self, tick: &CheckTick) -> anyhow::Result<()> {
        let summary = self.run_cycle(&tick.monitor_id).await?;
        if summary.failed > 0 {
            return Err(anyhow!(
                "{} of {} check results for monitor {} failed to process",
                summary.failed,
                summary.processed,
                tick.monitor_id
            ));
        }
        Ok(())
    }
}
