//! Error types for the check scheduler

use thiserror::Error;
use uptime_common::UnsupportedInterval;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Scheduler is not started")]
    NotStarted,

    #[error("Scheduler is stopped and cannot be restarted")]
    Stopped,

    #[error("Scheduler is already started")]
    AlreadyStarted,

    #[error(transparent)]
    UnsupportedInterval(#[from] UnsupportedInterval),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Durable store error: {0}")]
    Store(#[from] durable_store::StoreError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SchedulerError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SchedulerError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}
