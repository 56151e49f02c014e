//! Alert Engine
//!
//! Turns per-location check results into failure, recovery and SSL-expiry
//! alerts with incident lifecycle, under `all` or `any` multi-location trigger
//! semantics. Tracking state lives in the durable store; alerts and incidents
//! go through repository traits.

pub mod config;
pub mod cycle;
pub mod error;
pub mod memory;
pub mod notify;
pub mod repository;
pub mod retry;
pub mod state_machine;
mod tracker;

pub use config::{AlertEngineConfig, TriggerMode};
pub use cycle::{CheckCycleRunner, CheckExecutor, CycleSummary};
pub use error::{AlertEngineError, RepositoryError};
pub use memory::InMemoryRepository;
pub use notify::{NoopDispatcher, NotificationDispatcher, PubSubDispatcher};
pub use repository::{AlertRepository, IncidentRepository, MonitorRepository, RepositoryResult};
pub use retry::{retry_with_backoff, IsRetryable, RetryConfig};
pub use state_machine::{classify_ssl_expiry, AlertStateMachine, ProcessOutcome};

// Re-export Result type for convenience
pub type Result<T> = std::result::Result<T, AlertEngineError>;
