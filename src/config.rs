use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// One of `mock`, `local`, `remote`.
    #[serde(default = "default_backend_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL of the model server (local) or inference API (remote).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the bearer credential (remote only).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Canned responses for the mock backend, served in order.
    #[serde(default)]
    pub mock_responses: Vec<String>,
    /// Whether the mock cycles back to the start once exhausted.
    #[serde(default = "default_true")]
    pub mock_cycle: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: default_backend_provider(),
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_backend_timeout(),
            max_retries: default_max_retries(),
            mock_responses: Vec::new(),
            mock_cycle: true,
        }
    }
}

fn default_backend_provider() -> String {
    "local".to_string()
}
fn default_model() -> String {
    "llama3".to_string()
}
fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_api_key_env() -> String {
    "ASKD_API_KEY".to_string()
}
fn default_max_tokens() -> u32 {
    256
}
fn default_temperature() -> f32 {
    0.1
}
fn default_backend_timeout() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// One of `hash`, `local`, `remote`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Base URL for the `local`/`remote` providers. Defaults to the
    /// backend base URL when omitted.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: default_dims(),
            base_url: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_embedding_retries(),
        }
    }
}

fn default_embedding_provider() -> String {
    "hash".to_string()
}
fn default_dims() -> usize {
    384
}
fn default_embedding_timeout() -> u64 {
    30
}
fn default_embedding_retries() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1000
}
fn default_overlap_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Retention cap per session; oldest turns are discarded first.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// How many recent turns are folded into the prompt.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            history_turns: default_history_turns(),
        }
    }
}

fn default_max_turns() -> usize {
    50
}
fn default_history_turns() -> usize {
    10
}

/// Load configuration from a TOML file and validate it.
///
/// A missing file yields the full defaults (the service boots zero-config);
/// a file that exists but fails to parse or validate is a startup error.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

/// Fail-fast validation of a configuration, applied at startup.
pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        anyhow::bail!(
            "chunking.overlap_chars ({}) must be < chunking.max_chars ({})",
            config.chunking.overlap_chars,
            config.chunking.max_chars
        );
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.session.max_turns < 2 {
        anyhow::bail!("session.max_turns must be >= 2 (one question/answer pair)");
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }

    match config.embedding.provider.as_str() {
        "hash" | "local" | "remote" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be hash, local, or remote.",
            other
        ),
    }

    match config.backend.provider.as_str() {
        "mock" | "local" | "remote" => {}
        other => anyhow::bail!(
            "Unknown backend provider: '{}'. Must be mock, local, or remote.",
            other
        ),
    }

    if config.backend.timeout_secs == 0 {
        anyhow::bail!("backend.timeout_secs must be > 0");
    }

    Ok(())
}

impl EmbeddingConfig {
    /// Effective base URL: the embedding-specific one, or the caller-supplied fallback.
    pub fn effective_base_url<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.base_url.as_deref().unwrap_or(fallback)
    }
}
