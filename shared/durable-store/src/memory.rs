//! In-process durable store.
//!
//! Expiry is measured with `tokio::time::Instant`, so tests running with a
//! paused clock see TTLs elapse as virtual time advances.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::{DurableStore, Result, StoreError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    published: Mutex<Vec<(String, String)>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage: every operation fails with `StoreError::Unavailable`
    /// while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Messages published so far, as `(channel, message)` pairs.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().clone()
    }

    pub fn published_on(&self, channel: &str) -> Vec<String> {
        self.published
            .lock()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Remaining TTL of a live key, `None` if the key is absent or has no expiry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store marked unavailable".into()));
        }
        Ok(())
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

/// Glob match supporting `*` only, which is all the key namespace uses.
fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !key.starts_with(first) || key.len() < first.len() + last.len() || !key.ends_with(last) {
        return false;
    }

    let mut rest = &key[first.len()..key.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    true
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        Ok(self.live_value(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.check_available()?;
        let entry = Entry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn increment_counter(&self, key: &str, ttl: Duration) -> Result<i64> {
        self.check_available()?;
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let current = entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.parse::<i64>())
            .transpose()
            .map_err(|e| StoreError::Unavailable(format!("counter {} is not an integer: {}", key, e)))?
            .unwrap_or(0);
        let next = current + 1;
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(next)
    }

    async fn reset_counter(&self, key: &str) -> Result<()> {
        self.delete(key).await
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        self.check_available()?;
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if entries.get(key).map_or(false, |e| e.is_live(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(true)
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        self.check_available()?;
        self.published
            .lock()
            .push((channel.to_string(), message.to_string()));
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.check_available()?;
        let now = Instant::now();
        let entries = self.entries.lock();
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(k, e)| e.is_live(now) && glob_match(pattern, k))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DurableStoreExt;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("uptime:schedule:*", "uptime:schedule:m1"));
        assert!(glob_match("uptime:schedule:*", "uptime:schedule:"));
        assert!(!glob_match("uptime:schedule:*", "uptime:alert_state:m1"));
        assert!(glob_match("uptime:*:m1", "uptime:schedule:m1"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
        assert!(!glob_match("a*a", "a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let store = MemoryStore::new();
        store.set("k", "v", Some(Duration::from_secs(10))).await.unwrap();
        store.set("forever", "v", None).await.unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.get("forever").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_increment_counter_refreshes_ttl() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        assert_eq!(store.increment_counter("c", ttl).await.unwrap(), 1);
        tokio::time::advance(Duration::from_secs(50)).await;
        assert_eq!(store.increment_counter("c", ttl).await.unwrap(), 2);
        tokio::time::advance(Duration::from_secs(50)).await;
        assert_eq!(store.increment_counter("c", ttl).await.unwrap(), 3);

        store.reset_counter("c").await.unwrap();
        assert_eq!(store.increment_counter("c", ttl).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_if_absent_is_a_lock() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(30);
        assert!(store.set_if_absent("lock", "a", ttl).await.unwrap());
        assert!(!store.set_if_absent("lock", "b", ttl).await.unwrap());
        assert_eq!(store.get("lock").await.unwrap().as_deref(), Some("a"));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(store.set_if_absent("lock", "b", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_and_publish() {
        let store = MemoryStore::new();
        store.set("uptime:schedule:b", "{}", None).await.unwrap();
        store.set("uptime:schedule:a", "{}", None).await.unwrap();
        store.set("uptime:alert_state:a", "{}", None).await.unwrap();

        let keys = store.keys("uptime:schedule:*").await.unwrap();
        assert_eq!(keys, vec!["uptime:schedule:a", "uptime:schedule:b"]);

        store.publish("chan", "hello").await.unwrap();
        assert_eq!(store.published_on("chan"), vec!["hello".to_string()]);
        assert!(store.published_on("other").is_empty());
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let store = MemoryStore::new();
        store.set_json("n", &vec![1, 2, 3], None).await.unwrap();
        let value: Option<Vec<u32>> = store.get_json("n").await.unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));

        store.set("bad", "not json", None).await.unwrap();
        let bad: crate::Result<Option<Vec<u32>>> = store.get_json("bad").await;
        assert!(matches!(bad, Err(StoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_unavailable_switch() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let err = store.get("k").await.unwrap_err();
        assert!(err.is_retryable());
        store.set_unavailable(false);
        assert!(store.get("k").await.unwrap().is_none());
    }
}
