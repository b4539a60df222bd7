use async_trait::async_trait;
use forge_core::{ErrorKind, ForgeError, Paper};
use serde::Serialize;
use serde_json::Value;

/// Diagnostic snapshot for a connector, returned by [`SourceConnector::health`].
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Connector name, matching its configured `source` field on `Paper`.
    pub source: String,
    /// Whether the upstream service is currently reachable.
    pub healthy: bool,
}

/// Filters accepted by [`SourceConnector::search`]. Free-form per source;
/// represented as a JSON object so connectors can extend it without a
/// shared schema.
pub type SearchFilters = Value;

/// An adapter to one external academic database.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// This connector's name, used in `Paper::source` and cache keys.
    fn name(&self) -> &str;

    /// Searches for papers matching `query`, returning at most `limit`
    /// results. When `use_cache` is true, a prior cached response for the
    /// same canonical query may be returned instead of calling upstream.
    async fn search(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
        use_cache: bool,
    ) -> Result<Vec<Paper>, ForgeError>;

    /// Fetches a single paper by its source-scoped id.
    async fn get(&self, paper_id: &str, use_cache: bool) -> Result<Paper, ForgeError>;

    /// Checks upstream connectivity.
    async fn health(&self) -> HealthStatus;
}

/// Runs `call` with exponential-backoff retry on transient failures, up to
/// `max_attempts` total tries. Shared by every connector implementation in
/// this crate (the same backoff shape the LLM gateway uses, duplicated here
/// rather than factored into forge-core so neither crate depends on the
/// other for a three-line formula).
pub async fn with_retry<T, F, Fut>(
    max_attempts: u32,
    backoff_base_ms: u64,
    backoff_max_ms: u64,
    mut call: F,
) -> Result<T, ForgeError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ForgeError>>,
{
    let mut last_err: Option<ForgeError> = None;
    for attempt in 0..max_attempts.max(1) {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = matches!(err.kind(), ErrorKind::Transient | ErrorKind::Timeout);
                if !retryable || attempt + 1 == max_attempts {
                    return Err(err);
                }
                let delay = backoff_base_ms.saturating_mul(2u64.saturating_pow(attempt));
                tokio::time::sleep(std::time::Duration::from_millis(delay.min(backoff_max_ms))).await;
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| ForgeError::Internal("no attempts were made".into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(3, 0, 0, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ForgeError::transient("not yet"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_abort_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), ForgeError> = with_retry(5, 0, 0, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ForgeError::permanent("nope")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
