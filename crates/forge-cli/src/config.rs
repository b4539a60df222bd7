use serde::Deserialize;

use forge_llm::GatewayConfig;

/// Top-level configuration, loaded from `forge.toml` (or the path given via
/// `--config`) and overlaid with process environment toggles.
///
/// Every section is optional so a minimal or empty file is accepted; see
/// each section's own defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub llm: GatewayConfig,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub sources: Vec<SourceSection>,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_max_parallel_tasks")]
    pub max_parallel_tasks: usize,
    #[serde(default = "default_task_timeout_secs")]
    pub default_task_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            max_parallel_tasks: default_max_parallel_tasks(),
            default_task_timeout_secs: default_task_timeout_secs(),
            default_max_retries: default_max_retries(),
        }
    }
}

fn default_max_parallel_tasks() -> usize {
    3
}
fn default_task_timeout_secs() -> u64 {
    300
}
fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self { backend: default_backend(), remote_url: None, default_ttl_secs: default_ttl_secs() }
    }
}

fn default_backend() -> String {
    "memory".to_string()
}
fn default_ttl_secs() -> u64 {
    3600
}

impl StoreSection {
    /// `true` if configured to use the remote backend, before the
    /// `FORGE_STORE_MEMORY` environment override is applied.
    pub fn wants_remote(&self) -> bool {
        self.backend == "remote"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSection {
    pub name: String,
    pub base_url: String,
    #[serde(default = "default_rps")]
    pub requests_per_second: f64,
    #[serde(default = "default_rpm")]
    pub requests_per_minute: f64,
}

fn default_rps() -> f64 {
    1.0
}
fn default_rpm() -> f64 {
    30.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

/// Reads `path`, applies the `dotenvy` environment overlay, and parses the
/// result. Environment toggles for mock LLM mode and the in-memory store
/// are applied by the caller, not here, since they affect component
/// construction rather than the parsed config shape.
pub fn load(path: &std::path::Path) -> anyhow::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file '{}': {e}", path.display()))?;
    let config: Config = toml::from_str(&text)
        .map_err(|e| anyhow::anyhow!("failed to parse config file '{}': {e}", path.display()))?;
    Ok(config)
}

/// `FORGE_LLM_MOCK=1` forces mock mode regardless of `[llm]`.
pub fn env_forces_llm_mock() -> bool {
    std::env::var("FORGE_LLM_MOCK").is_ok_and(|v| v == "1")
}

/// `FORGE_STORE_MEMORY=1` forces the in-memory store regardless of `[store]`.
pub fn env_forces_memory_store() -> bool {
    std::env::var("FORGE_STORE_MEMORY").is_ok_and(|v| v == "1")
}
