//! Check Scheduler
//!
//! Maintains a restart-resilient mapping of monitor → recurring timer and
//! invokes a [`CheckCallback`] at each monitor's cadence.
//!
//! - Fire times align to wall-clock cadence boundaries (`cadence`).
//! - At most one in-flight callback per monitor; overlapping ticks are skipped.
//! - A process-wide ceiling bounds concurrently running callbacks; ticks over
//!   the ceiling are skipped.
//! - The schedule table is persisted at `uptime:schedule:{monitor_id}` and
//!   restored on `start()`.
//! - With `distributed_fire_lock`, each tick is claimed in the durable store so
//!   several scheduler instances fire it once.

pub mod cadence;
pub mod callback;
pub mod config;
pub mod error;
mod job;
pub mod publisher;
pub mod scheduler;

pub use callback::{CheckCallback, CheckTick};
pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use publisher::DueCheckPublisher;
pub use scheduler::{ReconcileReport, ScheduledCheck, Scheduler, SchedulerState};

// Re-export Result type for convenience
pub type Result<T> = std::result::Result<T, SchedulerError>;
