//! LLM backend abstraction and implementations.
//!
//! Defines the [`LlmBackend`] trait and three interchangeable variants,
//! selected once at construction and never branched on at call sites:
//!
//! - **[`MockBackend`]** — serves a fixed sequence of canned responses;
//!   never fails on reachability grounds. Used for tests and offline runs.
//! - **[`LocalBackend`]** — talks to a locally hosted model server
//!   (Ollama-style `POST /api/generate`) with a hard per-call timeout.
//! - **[`RemoteBackend`]** — talks to a hosted OpenAI-style inference API
//!   with a bearer credential; 429/5xx and network errors are retried
//!   with exponential backoff, other failures are fatal.
//!
//! Failure contract across variants: [`CoreError::BackendUnavailable`] for
//! connection/timeout problems, [`CoreError::Backend`] for non-2xx or
//! malformed responses, [`CoreError::InvalidPrompt`] for empty input.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::BackendConfig;
use crate::error::{CoreError, CoreResult};

/// Per-call generation options, plumbed from configuration.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl GenerateOptions {
    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Capability abstraction over interchangeable text-generation backends.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Variant name for health reporting and logs (e.g. `"local"`).
    fn name(&self) -> &str;

    /// Model identifier (e.g. `"llama3"`).
    fn model_name(&self) -> &str;

    /// Generate a completion for the prompt.
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> CoreResult<String>;

    /// Cheap reachability probe. Defaults to a minimal generate call;
    /// backends that can answer without spending a generation override it.
    async fn ping(&self, options: &GenerateOptions) -> CoreResult<()> {
        self.generate("ping", options).await.map(|_| ())
    }
}

fn reject_empty_prompt(prompt: &str) -> CoreResult<()> {
    if prompt.trim().is_empty() {
        return Err(CoreError::InvalidPrompt);
    }
    Ok(())
}

// ============ Mock Backend ============

/// Backend serving a configured fixed sequence of responses.
pub struct MockBackend {
    model: String,
    responses: Vec<String>,
    cycle: bool,
    cursor: Mutex<usize>,
}

impl MockBackend {
    pub fn new(model: String, responses: Vec<String>, cycle: bool) -> Self {
        Self {
            model,
            responses,
            cycle,
            cursor: Mutex::new(0),
        }
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, _options: &GenerateOptions) -> CoreResult<String> {
        reject_empty_prompt(prompt)?;

        if self.responses.is_empty() {
            return Err(CoreError::Backend("no mock responses configured".into()));
        }

        let mut cursor = self.cursor.lock().unwrap();
        if *cursor >= self.responses.len() {
            if self.cycle {
                *cursor = 0;
            } else {
                return Err(CoreError::Backend("mock responses exhausted".into()));
            }
        }
        let response = self.responses[*cursor].clone();
        *cursor += 1;
        Ok(response)
    }

    /// The mock is reachable by definition; a probe must not consume one
    /// of the configured responses.
    async fn ping(&self, _options: &GenerateOptions) -> CoreResult<()> {
        Ok(())
    }
}

// ============ Local Backend ============

/// Backend for a locally hosted model server (Ollama-style API).
///
/// The readiness wait is the orchestration layer's job; this backend only
/// guarantees that a generate call times out rather than blocking forever
/// when the server has not come up.
pub struct LocalBackend {
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl LocalBackend {
    pub fn new(model: String, base_url: String) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| CoreError::Backend(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            model,
            base_url,
            client,
        })
    }
}

#[async_trait]
impl LlmBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> CoreResult<String> {
        reject_empty_prompt(prompt)?;

        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "num_predict": options.max_tokens,
                "temperature": options.temperature,
            },
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(options.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::BackendUnavailable(format!("model server: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CoreError::Backend(format!(
                "model server error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CoreError::Backend(format!("malformed model server response: {}", e)))?;

        json.get("response")
            .and_then(|r| r.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| CoreError::Backend("missing response field in model server reply".into()))
    }
}

// ============ Remote Backend ============

/// Backend for a hosted OpenAI-style inference API.
pub struct RemoteBackend {
    model: String,
    base_url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl RemoteBackend {
    pub fn new(config: &BackendConfig) -> CoreResult<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            CoreError::Backend(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| CoreError::Backend(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl LlmBackend for RemoteBackend {
    fn name(&self) -> &str {
        "remote"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> CoreResult<String> {
        reject_empty_prompt(prompt)?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1u64 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/v1/chat/completions", self.base_url))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .timeout(options.timeout)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            CoreError::Backend(format!("malformed inference response: {}", e))
                        })?;
                        return parse_completion(&json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(CoreError::Backend(format!(
                            "inference API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    // Client error (not 429) — fatal
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(CoreError::Backend(format!(
                        "inference API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(CoreError::BackendUnavailable(format!(
                        "inference API: {}",
                        e
                    )));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| CoreError::Backend("generation failed after retries".into())))
    }
}

/// Extract `choices[0].message.content` from a chat completion response.
fn parse_completion(json: &serde_json::Value) -> CoreResult<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| CoreError::Backend("missing choices in inference response".into()))
}

/// Create the configured [`LlmBackend`] variant.
pub fn create_backend(config: &BackendConfig) -> CoreResult<Box<dyn LlmBackend>> {
    match config.provider.as_str() {
        "mock" => Ok(Box::new(MockBackend::new(
            config.model.clone(),
            config.mock_responses.clone(),
            config.mock_cycle,
        ))),
        "local" => Ok(Box::new(LocalBackend::new(
            config.model.clone(),
            config.base_url.clone(),
        )?)),
        "remote" => Ok(Box::new(RemoteBackend::new(config)?)),
        other => Err(CoreError::Backend(format!("unknown backend provider: {}", other))),
    }
}
