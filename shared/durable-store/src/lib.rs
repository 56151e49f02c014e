//! Durable store abstraction for the uptime core.
//!
//! The scheduler and the alert engine only ever talk to a [`DurableStore`]:
//! a TTL-capable key/value store with atomic counters, set-if-absent locks,
//! pattern enumeration and publish/subscribe.
//!
//! - [`RedisStore`]: production implementation over a `deadpool-redis` pool.
//! - [`MemoryStore`]: in-process implementation with the same TTL semantics,
//!   used for embedding and tests.
//!
//! # Key Schema
//!
//! ```text
//! uptime:schedule:{monitor_id}                      # ScheduleEntry JSON (no TTL)
//! uptime:alert_state:{monitor_id}                   # AlertTrackingState JSON (7d TTL)
//! uptime:location_failures:{monitor_id}:{location}  # INCR counter (TTL'd)
//! uptime:ssl_alert:{monitor_id}:{alert_type}        # SSL dedup marker (24h TTL)
//! uptime:fire_lock:{monitor_id}:{tick_ts}           # cross-instance fire lock
//! ```

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use store::{DurableStore, DurableStoreExt};
