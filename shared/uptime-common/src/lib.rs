//! Shared uptime monitoring contracts.
//!
//! This crate is the Rust source of truth for the records exchanged between the
//! check scheduler, the alert engine and their collaborators:
//! - `Monitor` / `CheckInterval` (read-only monitor configuration)
//! - `CheckResult` (one probe outcome per monitor, location and cycle)
//! - `Alert` / `Incident` (alert lifecycle records)
//! - `AlertTrackingState` (per-monitor failure tracking, persisted with a TTL)
//! - `ScheduleEntry` / `CheckDueV1` (persisted schedule table and due-check message)
//! - `keys` (durable-store key and channel namespace)

pub mod alert;
pub mod check;
pub mod incident;
pub mod keys;
pub mod monitor;
pub mod schedule;
pub mod tracking;

pub use alert::*;
pub use check::*;
pub use incident::*;
pub use keys::*;
pub use monitor::*;
pub use schedule::*;
pub use tracking::*;
