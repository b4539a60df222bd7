use std::sync::Arc;

use forge_core::ForgeError;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::backend::{GenerateRequest, HttpLlmBackend, LlmBackend, MockLlmBackend};
use crate::config::GatewayConfig;

/// Bounded, retrying facade over a text-generation backend.
///
/// Stateless between calls except for the connection pool (owned by the
/// backend) and the rate-budget semaphore.
pub struct LlmGateway {
    backend: Box<dyn LlmBackend>,
    config: GatewayConfig,
    budget: Arc<Semaphore>,
}

impl LlmGateway {
    /// Builds a gateway from configuration, selecting the mock backend when
    /// `config.is_mock()` is true.
    pub fn new(config: GatewayConfig) -> Self {
        let backend: Box<dyn LlmBackend> = if config.is_mock() {
            Box::new(MockLlmBackend::new())
        } else {
            Box::new(HttpLlmBackend::new(&config))
        };
        Self::with_backend(backend, config)
    }

    /// Builds a gateway over an explicit backend (used by tests to inject a
    /// mock or failing backend).
    pub fn with_backend(backend: Box<dyn LlmBackend>, config: GatewayConfig) -> Self {
        let budget = Arc::new(Semaphore::new(config.max_concurrent_calls.max(1)));
        Self {
            backend,
            config,
            budget,
        }
    }

    /// Generates completion text for `prompt`, retrying transient failures
    /// with exponential backoff up to `config.max_attempts`.
    pub async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<String, ForgeError> {
        let _permit = self
            .budget
            .acquire()
            .await
            .expect("gateway semaphore is never closed");

        let mut last_err: Option<ForgeError> = None;
        for attempt in 0..self.config.max_attempts {
            let request = GenerateRequest {
                prompt,
                system_prompt,
                max_tokens,
                temperature,
            };
            match self.backend.generate(request).await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    if !err.is_retryable() || attempt + 1 == self.config.max_attempts {
                        warn!(attempt, error = %err, "llm gateway call failed, not retrying");
                        last_err = Some(err);
                        break;
                    }
                    let delay = compute_backoff(&self.config, attempt);
                    info!(attempt, delay_ms = delay, error = %err, "llm gateway call failed, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ForgeError::Internal("no attempts were made".into())))
    }

    /// Releases underlying connections. A no-op for the mock backend; for
    /// HTTP backends the connection pool is dropped with the gateway itself,
    /// so this exists primarily as an explicit lifecycle hook for callers
    /// that want symmetry with `StateStore`/registry shutdown.
    pub async fn shutdown(&self) {}
}

fn compute_backoff(config: &GatewayConfig, attempt: u32) -> u64 {
    let delay = config
        .backoff_base_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    delay.min(config.backoff_max_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex;

    struct ScriptedBackend {
        results: Mutex<Vec<Result<String, ForgeError>>>,
        calls: AtomicU32,
    }

    impl ScriptedBackend {
        fn new(results: Vec<Result<String, ForgeError>>) -> Self {
            Self {
                results: Mutex::new(results),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn generate(&self, _request: GenerateRequest<'_>) -> Result<String, ForgeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut results = self.results.lock().await;
            if results.is_empty() {
                Err(ForgeError::Internal("no more scripted results".into()))
            } else {
                results.remove(0)
            }
        }
    }

    fn instant_config() -> GatewayConfig {
        GatewayConfig {
            backoff_base_ms: 0,
            backoff_max_ms: 0,
            max_attempts: 3,
            ..GatewayConfig::default()
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let backend = ScriptedBackend::new(vec![
            Err(ForgeError::transient("rate limited")),
            Err(ForgeError::transient("rate limited")),
            Ok("done".to_string()),
        ]);
        let gateway = LlmGateway::with_backend(Box::new(backend), instant_config());
        let result = gateway.generate("prompt", None, None, None).await.unwrap();
        assert_eq!(result, "done");
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let backend = ScriptedBackend::new(vec![
            Err(ForgeError::permanent("bad request")),
            Ok("should never be reached".to_string()),
        ]);
        let gateway = LlmGateway::with_backend(Box::new(backend), instant_config());
        let err = gateway.generate("prompt", None, None, None).await.unwrap_err();
        assert_eq!(err.kind(), forge_core::ErrorKind::Permanent);
    }

    #[tokio::test]
    async fn exhausting_retries_surfaces_the_last_error() {
        let backend = ScriptedBackend::new(vec![
            Err(ForgeError::transient("one")),
            Err(ForgeError::transient("two")),
            Err(ForgeError::transient("three")),
        ]);
        let gateway = LlmGateway::with_backend(Box::new(backend), instant_config());
        let err = gateway.generate("prompt", None, None, None).await.unwrap_err();
        assert!(err.to_string().contains("three"));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = GatewayConfig {
            backoff_base_ms: 1000,
            backoff_max_ms: 5000,
            ..GatewayConfig::default()
        };
        assert_eq!(compute_backoff(&config, 0), 1000);
        assert_eq!(compute_backoff(&config, 1), 2000);
        assert_eq!(compute_backoff(&config, 2), 4000);
        assert_eq!(compute_backoff(&config, 3), 5000);
    }

    #[tokio::test]
    async fn mock_gateway_is_deterministic_across_runs() {
        let gateway_a = LlmGateway::new(GatewayConfig::default());
        let gateway_b = LlmGateway::new(GatewayConfig::default());
        let a = gateway_a
            .generate("write the introduction", Some("system"), None, None)
            .await
            .unwrap();
        let b = gateway_b
            .generate("write the introduction", Some("system"), None, None)
            .await
            .unwrap();
        assert_eq!(a, b);
    }
}
