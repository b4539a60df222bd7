//! The shared, TTL'd keyed blob store that every worker of a job reads and
//! writes through. Two backends satisfy the same [`StateStore`] contract: an
//! in-process map for tests and single-node deployments, and a networked
//! tier reached over HTTP.

mod memory;
mod remote;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

pub use memory::InMemoryStateStore;
pub use remote::RemoteStateStore;

/// Error surface for state store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying transport (HTTP, etc.) failed.
    #[error("store transport error: {0}")]
    Transport(String),
    /// A stored value failed to (de)serialize.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Liveness/diagnostic snapshot returned by [`StateStore::health`].
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Whether the backend is currently reachable.
    pub healthy: bool,
    /// Backend name (`"memory"` or `"remote"`), for diagnostics.
    pub backend: &'static str,
    /// Number of live (non-expired) entries, when cheaply known.
    pub entry_count: Option<usize>,
}

/// Keyed, TTL'd blob store contract. All operations are asynchronous and may
/// fail independently of one another.
///
/// Consistency requirement: reads after writes by the same caller observe the
/// write (read-your-writes within a job); both backends here satisfy this
/// trivially (the in-memory backend via a single map, the remote backend
/// because it has no local caching layer of its own).
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Stores `value` under `key`, expiring after `ttl_seconds`.
    async fn set(&self, key: &str, value: Value, ttl_seconds: u64) -> Result<(), StoreError>;

    /// Fetches the value at `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Deletes the value at `key`. Returns `true` if a value was present.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Checks connectivity.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Returns a diagnostic snapshot.
    async fn health(&self) -> HealthStatus;

    /// Convenience wrapper around `get` for the `cache:` key prefix.
    async fn cache_get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.get(&cache_key(key)).await
    }

    /// Convenience wrapper around `set` for the `cache:` key prefix.
    async fn cache_set(&self, key: &str, value: Value, ttl_seconds: u64) -> Result<(), StoreError> {
        self.set(&cache_key(key), value, ttl_seconds).await
    }

    /// Convenience wrapper serializing `value` before calling [`StateStore::set`].
    async fn set_serialized(
        &self,
        key: &str,
        value: &(impl Serialize + Sync),
        ttl_seconds: u64,
    ) -> Result<(), StoreError> {
        let value = serde_json::to_value(value)?;
        self.set(key, value, ttl_seconds).await
    }
}

fn cache_key(key: &str) -> String {
    if key.starts_with("cache:") {
        key.to_string()
    } else {
        format!("cache:{key}")
    }
}

/// Builds the authoritative key for a task's output: `job:{job_id}:task:{kind}`.
pub fn task_output_key(job_id: forge_core::JobId, kind: forge_core::TaskKind) -> String {
    format!("job:{job_id}:task:{kind}")
}

/// Builds an agent-to-agent scratch key: `job:{job_id}:shared:{name}`
/// (discouraged; prefer dependency edges).
pub fn shared_key(job_id: forge_core::JobId, name: &str) -> String {
    format!("job:{job_id}:shared:{name}")
}

/// Builds the canonical source-connector cache key from a query signature.
pub fn connector_cache_key(query: &str, filters: &str, source: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    hasher.update(b"|");
    hasher.update(filters.as_bytes());
    hasher.update(b"|");
    hasher.update(source.as_bytes());
    format!("cache:{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_adds_prefix_once() {
        assert_eq!(cache_key("foo"), "cache:foo");
        assert_eq!(cache_key("cache:foo"), "cache:foo");
    }

    #[test]
    fn connector_cache_key_is_deterministic() {
        let a = connector_cache_key("deep learning", "{}", "arxiv");
        let b = connector_cache_key("deep learning", "{}", "arxiv");
        assert_eq!(a, b);
        let c = connector_cache_key("deep learning", "{}", "semantic_scholar");
        assert_ne!(a, c);
    }
}
