//! Bounded exponential-backoff retries for notification dispatch.

use backoff::{backoff::Backoff, ExponentialBackoff};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 200,
            max_delay_ms: 5_000,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, initial_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms,
            ..Default::default()
        }
    }

    fn to_exponential_backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(self.initial_delay_ms),
            max_interval: Duration::from_millis(self.max_delay_ms.max(self.initial_delay_ms)),
            multiplier: self.multiplier,
            max_elapsed_time: None,
            ..Default::default()
        };
        if !self.jitter {
            backoff.randomization_factor = 0.0;
        }
        backoff
    }
}

/// Classifies errors worth another attempt.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for durable_store::StoreError {
    fn is_retryable(&self) -> bool {
        durable_store::StoreError::is_retryable(self)
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error or
/// `max_attempts` is reached. Returns the final result with the number of
/// attempts made.
pub async fn retry_with_backoff<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> (Result<T, E>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsRetryable,
{
    let max_attempts = config.max_attempts.max(1);
    let mut backoff = config.to_exponential_backoff();
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("Operation succeeded after {} attempts", attempt);
                }
                return (Ok(value), attempt);
            }
            Err(error) => {
                if attempt >= max_attempts || !error.is_retryable() {
                    warn!("Operation failed after {} attempts: {}", attempt, error);
                    return (Err(error), attempt);
                }
                let delay = backoff
                    .next_backoff()
                    .unwrap_or_else(|| Duration::from_millis(config.max_delay_ms));
                warn!(
                    "Operation failed (attempt {}/{}), retrying in {:?}: {}",
                    attempt, max_attempts, delay, error
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
