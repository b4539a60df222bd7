use async_trait::async_trait;
use forge_core::ForgeError;
use serde::Deserialize;
use serde_json::json;

use crate::config::{GatewayConfig, LlmProvider};

/// A single completion request.
#[derive(Debug, Clone)]
pub struct GenerateRequest<'a> {
    /// The user-facing prompt.
    pub prompt: &'a str,
    /// Optional system prompt.
    pub system_prompt: Option<&'a str>,
    /// Optional max-token cap; backend-specific default applies if absent.
    pub max_tokens: Option<u32>,
    /// Optional sampling temperature; backend-specific default applies if absent.
    pub temperature: Option<f32>,
}

/// The pluggable seam every LLM provider implements. Any generator
/// satisfying this trait works with [`crate::LlmGateway`].
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Produces completion text for a single request.
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, ForgeError>;
}

/// Generic HTTP backend for providers exposing an OpenAI/Claude-shaped chat
/// completions endpoint. Which request/response shape is used is determined
/// by `provider`.
pub struct HttpLlmBackend {
    client: reqwest::Client,
    provider: LlmProvider,
    base_url: String,
    model_id: String,
    api_key: String,
}

impl HttpLlmBackend {
    /// Builds an HTTP backend from a resolved gateway configuration.
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider: config.provider.clone(),
            base_url: config.base_url().to_string(),
            model_id: config.model_id.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContentBlock>,
}

#[derive(Deserialize)]
struct ClaudeContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl LlmBackend for HttpLlmBackend {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, ForgeError> {
        let max_tokens = request.max_tokens.unwrap_or(4096);
        let temperature = request.temperature.unwrap_or(0.7);

        let resp = match self.provider {
            LlmProvider::Claude => {
                let body = json!({
                    "model": self.model_id,
                    "max_tokens": max_tokens,
                    "temperature": temperature,
                    "system": request.system_prompt.unwrap_or_default(),
                    "messages": [{"role": "user", "content": request.prompt}],
                });
                self.client
                    .post(format!("{}/v1/messages", self.base_url))
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", "2023-06-01")
                    .json(&body)
                    .send()
                    .await?
            }
            LlmProvider::OpenAi => {
                let mut messages = Vec::new();
                if let Some(system) = request.system_prompt {
                    messages.push(json!({"role": "system", "content": system}));
                }
                messages.push(json!({"role": "user", "content": request.prompt}));
                let body = json!({
                    "model": self.model_id,
                    "max_tokens": max_tokens,
                    "temperature": temperature,
                    "messages": messages,
                });
                self.client
                    .post(format!("{}/v1/chat/completions", self.base_url))
                    .bearer_auth(&self.api_key)
                    .json(&body)
                    .send()
                    .await?
            }
            LlmProvider::Mock => {
                return Err(ForgeError::Internal(
                    "HttpLlmBackend cannot serve the Mock provider".into(),
                ))
            }
        };

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            let message = format!("{status}: {body}");
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                ForgeError::transient(message)
            } else {
                ForgeError::permanent(message)
            });
        }

        match self.provider {
            LlmProvider::Claude => {
                let parsed: ClaudeResponse = resp.json().await?;
                Ok(parsed
                    .content
                    .into_iter()
                    .map(|b| b.text)
                    .collect::<Vec<_>>()
                    .join(""))
            }
            LlmProvider::OpenAi => {
                let parsed: OpenAiResponse = resp.json().await?;
                Ok(parsed
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .unwrap_or_default())
            }
            LlmProvider::Mock => unreachable!(),
        }
    }
}

/// Deterministic replay backend. Returns canned text derived from a hash of
/// the prompt (plus system prompt), so the same input always produces the
/// same output — no network, no state beyond the hash function itself.
pub struct MockLlmBackend;

impl MockLlmBackend {
    /// Builds the mock backend. Stateless; always succeeds.
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockLlmBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmBackend for MockLlmBackend {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, ForgeError> {
        Ok(mock_completion(request.system_prompt, request.prompt))
    }
}

/// Produces deterministic canned text keyed on the prompt hash, usable
/// directly by tests that want the gateway's exact mock output without
/// going through retry/concurrency plumbing.
pub fn mock_completion(system_prompt: Option<&str>, prompt: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    if let Some(system) = system_prompt {
        hasher.update(system.as_bytes());
        hasher.update(b"\0");
    }
    hasher.update(prompt.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!(
        "[mock:{}] generated content for prompt of {} characters",
        &digest[..12],
        prompt.len()
    )
}
