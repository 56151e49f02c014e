use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

use crate::Result;

/// Minimum set of operations the uptime core needs from its durable store.
///
/// Implementations must be safe to share across tasks. Atomicity is only
/// required for `increment_counter` and `set_if_absent`.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// `ttl = None` stores the value without expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Atomically increments the counter and (re)arms its TTL. Returns the new value.
    async fn increment_counter(&self, key: &str, ttl: Duration) -> Result<i64>;

    async fn reset_counter(&self, key: &str) -> Result<()>;

    /// Lock primitive. Returns `true` if this call created the key.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    async fn publish(&self, channel: &str, message: &str) -> Result<()>;

    /// Enumerates keys matching a glob pattern (`*` wildcard).
    /// Used for restore-on-startup only.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;
}

/// JSON convenience layer over any [`DurableStore`].
#[async_trait]
pub trait DurableStoreExt: DurableStore {
    async fn get_json<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set_json<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw, ttl).await
    }

    async fn publish_json<T>(&self, channel: &str, message: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let raw = serde_json::to_string(message)?;
        self.publish(channel, &raw).await
    }
}

impl<S: DurableStore + ?Sized> DurableStoreExt for S {}
