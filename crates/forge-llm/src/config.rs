use serde::{Deserialize, Serialize};

/// The text-generation backend a [`crate::LlmGateway`] talks to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Anthropic's Messages API.
    Claude,
    /// OpenAI's Chat Completions API.
    OpenAi,
    /// Deterministic canned responses; no network.
    Mock,
}

/// Gateway configuration, loaded from the `[llm]` section of the workspace
/// config (see `forge-cli`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Which backend to use.
    #[serde(default = "default_provider")]
    pub provider: LlmProvider,
    /// Overrides mock mode regardless of `provider`; also settable via the
    /// `FORGE_LLM_MOCK` environment toggle.
    #[serde(default)]
    pub mock_mode: bool,
    /// Model identifier passed to the provider (ignored in mock mode).
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// API key (ignored in mock mode).
    #[serde(default)]
    pub api_key: String,
    /// Override for the provider's default base URL.
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Maximum number of concurrent in-flight calls to this provider.
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,
    /// Base delay in milliseconds for exponential backoff.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Maximum delay in milliseconds (backoff cap).
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Maximum attempts (initial call + retries) before surfacing the error.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_provider() -> LlmProvider {
    LlmProvider::Mock
}
fn default_model_id() -> String {
    "default".to_string()
}
fn default_max_concurrent_calls() -> usize {
    4
}
fn default_backoff_base_ms() -> u64 {
    1000
}
fn default_backoff_max_ms() -> u64 {
    30_000
}
fn default_max_attempts() -> u32 {
    3
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            mock_mode: false,
            model_id: default_model_id(),
            api_key: String::new(),
            api_base_url: None,
            max_concurrent_calls: default_max_concurrent_calls(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl GatewayConfig {
    /// Whether this configuration should run without network I/O: either
    /// `mock_mode` was set explicitly, or the provider itself is `Mock`.
    pub fn is_mock(&self) -> bool {
        self.mock_mode || self.provider == LlmProvider::Mock
    }

    /// Resolves the effective base URL for HTTP backends.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            return url;
        }
        match self.provider {
            LlmProvider::Claude => "https://api.anthropic.com",
            LlmProvider::OpenAi => "https://api.openai.com",
            LlmProvider::Mock => "local://mock",
        }
    }
}
