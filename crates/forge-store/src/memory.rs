use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::{HealthStatus, StateStore, StoreError};

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// In-process, TTL-expiring map. Used in tests and single-node deployments.
///
/// Expiry is lazy: entries are only reaped on read/write, not on a
/// background timer.
pub struct InMemoryStateStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn is_live(entry: &Entry, now: Instant) -> bool {
        entry.expires_at > now
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn set(&self, key: &str, value: Value, ttl_seconds: u64) -> Result<(), StoreError> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds.max(1));
        self.entries
            .write()
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let now = Instant::now();
        let guard = self.entries.read();
        Ok(guard
            .get(key)
            .filter(|e| Self::is_live(e, now))
            .map(|e| e.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.write().remove(key).is_some())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn health(&self) -> HealthStatus {
        let now = Instant::now();
        let count = self
            .entries
            .read()
            .values()
            .filter(|e| Self::is_live(e, now))
            .count();
        HealthStatus {
            healthy: true,
            backend: "memory",
            entry_count: Some(count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn read_your_writes() {
        let store = InMemoryStateStore::new();
        store.set("k", json!({"a": 1}), 60).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn absent_key_returns_none() {
        let store = InMemoryStateStore::new();
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entry_is_invisible() {
        let store = InMemoryStateStore::new();
        store.set("k", json!(1), 0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_reports_whether_a_value_was_present() {
        let store = InMemoryStateStore::new();
        assert!(!store.delete("k").await.unwrap());
        store.set("k", json!(1), 60).await.unwrap();
        assert!(store.delete("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn cache_helpers_share_the_cache_prefix() {
        let store = InMemoryStateStore::new();
        store.cache_set("q", json!("v"), 60).await.unwrap();
        assert_eq!(store.get("cache:q").await.unwrap(), Some(json!("v")));
        assert_eq!(store.cache_get("q").await.unwrap(), Some(json!("v")));
    }

    #[tokio::test]
    async fn health_reports_only_live_entries() {
        let store = InMemoryStateStore::new();
        store.set("a", json!(1), 60).await.unwrap();
        store.set("b", json!(2), 0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let health = store.health().await;
        assert_eq!(health.entry_count, Some(1));
    }
}
