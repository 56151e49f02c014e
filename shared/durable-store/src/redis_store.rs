//! Redis-backed durable store.
//!
//! Every command goes through a `deadpool-redis` connection pool. Key
//! enumeration uses cursor-based `SCAN MATCH` so restores never block Redis.

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use std::time::Duration;
use tracing::{debug, info};

use crate::{DurableStore, Result, StoreError};

const SCAN_COUNT: usize = 200;

pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    /// Creates the pool and verifies connectivity with a `PING`.
    pub async fn connect(redis_url: &str, pool_size: usize) -> Result<Self> {
        let mut config = Config::from_url(redis_url);
        config.pool = Some(deadpool_redis::PoolConfig::new(pool_size.max(1)));
        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::Configuration(format!("Failed to create pool: {}", e)))?;

        let store = Self { pool };
        let mut conn = store.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!(pool_size, "Redis connection pool initialized");
        Ok(store)
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    // Redis rejects EX 0.
    ttl.as_secs().max(1)
}

#[async_trait]
impl DurableStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl_secs(ttl));
        }
        cmd.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(())
    }

    async fn increment_counter(&self, key: &str, ttl: Duration) -> Result<i64> {
        let mut conn = self.connection().await?;
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("INCR")
            .arg(key)
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs(ttl))
            .ignore();
        let (count,): (i64,) = pipe.query_async(&mut conn).await?;
        debug!(key, count, "Incremented counter");
        Ok(count)
    }

    async fn reset_counter(&self, key: &str) -> Result<()> {
        self.delete(key).await
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl));
        let result: Option<String> = cmd.query_async(&mut conn).await?;
        Ok(result.is_some())
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(message)
            .query_async(&mut conn)
            .await?;
        debug!(channel, receivers, "Published message");
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.connection().await?;
        let mut cursor: u64 = 0;
        let mut found = Vec::new();
        loop {
            let mut cmd = redis::cmd("SCAN");
            cmd.arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT);
            let (next, batch): (u64, Vec<String>) = cmd.query_async(&mut conn).await?;
            found.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once.
        found.sort();
        found.dedup();
        Ok(found)
    }
}
