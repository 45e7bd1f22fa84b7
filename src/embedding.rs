//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`HashProvider`]** — deterministic in-process token feature hashing;
//!   the offline default. Lexically similar texts get nearby vectors.
//! - **[`LocalProvider`]** — calls an Ollama-style `/api/embeddings`
//!   endpoint on a locally hosted model server.
//! - **[`RemoteProvider`]** — calls an OpenAI-style `/v1/embeddings`
//!   endpoint with a bearer credential, batching, retry, and backoff.
//!
//! All vectors produced by one provider instance share the same
//! dimensionality for the lifetime of the process.
//!
//! # Retry Strategy (remote)
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{CoreError, CoreResult};

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"hash-384"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality.
    fn dims(&self) -> usize;

    /// Embed a single text. Fails with [`CoreError::Embedding`] on empty
    /// input or provider unreachability.
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>>;

    /// Embed a batch of texts, same order and length as the input.
    async fn embed_batch(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

fn reject_empty(text: &str) -> CoreResult<()> {
    if text.trim().is_empty() {
        return Err(CoreError::Embedding("cannot embed empty text".into()));
    }
    Ok(())
}

// ============ Hash Provider ============

/// Deterministic token feature-hashing embedder.
///
/// Lowercases, splits on non-alphanumeric characters, hashes each token
/// into a bucket with a sign bit, and L2-normalizes the result. Texts that
/// share tokens get high cosine similarity; the output depends only on the
/// input text and the configured dimensionality.
pub struct HashProvider {
    model: String,
    dims: usize,
}

impl HashProvider {
    pub fn new(dims: usize) -> Self {
        Self {
            model: format!("hash-{}", dims),
            dims,
        }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut vec = vec![0.0f32; self.dims];

        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();
            let bucket = (h % self.dims as u64) as usize;
            let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vec[bucket] += sign;
        }

        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut vec {
                *x /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>> {
        reject_empty(text)?;
        Ok(self.embed_sync(text))
    }
}

// ============ Local Provider ============

/// Embedding provider backed by a locally hosted model server
/// (Ollama-style `POST /api/embeddings`).
pub struct LocalProvider {
    model: String,
    dims: usize,
    base_url: String,
    client: reqwest::Client,
}

impl LocalProvider {
    pub fn new(model: String, dims: usize, base_url: String, timeout_secs: u64) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CoreError::Embedding(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            model,
            dims,
            base_url,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>> {
        reject_empty(text)?;

        let body = serde_json::json!({
            "model": self.model,
            "prompt": text,
        });

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Embedding(format!("embedding server unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CoreError::Embedding(format!(
                "embedding server error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CoreError::Embedding(format!("malformed embedding response: {}", e)))?;

        let vec = json
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| CoreError::Embedding("missing embedding in response".into()))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect::<Vec<f32>>();

        if vec.len() != self.dims {
            return Err(CoreError::Embedding(format!(
                "embedding dimensionality mismatch: expected {}, got {}",
                self.dims,
                vec.len()
            )));
        }

        Ok(vec)
    }
}

// ============ Remote Provider ============

/// Embedding provider using a hosted OpenAI-style inference API.
///
/// Calls `POST {base_url}/v1/embeddings` with a bearer credential read
/// from the configured environment variable. Batches multiple texts per
/// call and retries rate limits and server errors with exponential backoff.
pub struct RemoteProvider {
    model: String,
    dims: usize,
    base_url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl RemoteProvider {
    pub fn new(config: &EmbeddingConfig, base_url: String) -> CoreResult<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| CoreError::Embedding("embedding.model required for remote provider".into()))?;

        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            CoreError::Embedding(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::Embedding(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            model,
            dims: config.dims,
            base_url,
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }

    async fn request_batch(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
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
                .post(format!("{}/v1/embeddings", self.base_url))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            CoreError::Embedding(format!("malformed embedding response: {}", e))
                        })?;
                        return parse_embeddings_response(&json, self.dims);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(CoreError::Embedding(format!(
                            "embedding API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(CoreError::Embedding(format!(
                        "embedding API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(CoreError::Embedding(format!(
                        "embedding API unreachable: {}",
                        e
                    )));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| CoreError::Embedding("embedding failed after retries".into())))
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>> {
        reject_empty(text)?;
        let mut out = self.request_batch(&[text.to_string()]).await?;
        out.pop()
            .ok_or_else(|| CoreError::Embedding("empty embedding response".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        for text in texts {
            reject_empty(text)?;
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request_batch(texts).await
    }
}

/// Parse an OpenAI-style embeddings response: `data[].embedding` in input order.
fn parse_embeddings_response(json: &serde_json::Value, dims: usize) -> CoreResult<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| CoreError::Embedding("invalid response: missing data array".into()))?;

    let mut embeddings = Vec::with_capacity(data.len());

    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| CoreError::Embedding("invalid response: missing embedding".into()))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        if vec.len() != dims {
            return Err(CoreError::Embedding(format!(
                "embedding dimensionality mismatch: expected {}, got {}",
                dims,
                vec.len()
            )));
        }

        embeddings.push(vec);
    }

    Ok(embeddings)
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration.
///
/// `fallback_base_url` is used for the `local`/`remote` providers when the
/// embedding section does not set its own `base_url` (typically the LLM
/// backend's address, so one local model server serves both roles).
pub fn create_provider(
    config: &EmbeddingConfig,
    fallback_base_url: &str,
) -> CoreResult<Box<dyn EmbeddingProvider>> {
    let base_url = config.effective_base_url(fallback_base_url).to_string();

    match config.provider.as_str() {
        "hash" => Ok(Box::new(HashProvider::new(config.dims))),
        "local" => {
            let model = config
                .model
                .clone()
                .ok_or_else(|| CoreError::Embedding("embedding.model required for local provider".into()))?;
            Ok(Box::new(LocalProvider::new(
                model,
                config.dims,
                base_url,
                config.timeout_secs,
            )?))
        }
        "remote" => Ok(Box::new(RemoteProvider::new(config, base_url)?)),
        other => Err(CoreError::Embedding(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors or vectors of
/// different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_deterministic() {
        let provider = HashProvider::new(64);
        let a = provider.embed("Machine Learning é uma subárea da IA.").await.unwrap();
        let b = provider.embed("Machine Learning é uma subárea da IA.").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_hash_rejects_empty() {
        let provider = HashProvider::new(64);
        assert!(provider.embed("").await.is_err());
        assert!(provider.embed("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_hash_similar_texts_score_higher() {
        let provider = HashProvider::new(256);
        let q = provider.embed("o que é machine learning").await.unwrap();
        let related = provider
            .embed("machine learning é uma subárea da inteligência artificial")
            .await
            .unwrap();
        let unrelated = provider
            .embed("receita de bolo de cenoura com chocolate")
            .await
            .unwrap();

        assert!(cosine_similarity(&q, &related) > cosine_similarity(&q, &unrelated));
    }

    #[tokio::test]
    async fn test_hash_is_normalized() {
        let provider = HashProvider::new(128);
        let v = provider.embed("hello world").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_length() {
        let provider = HashProvider::new(32);
        let texts = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
        let batch = provider.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 3);
        for (text, vec) in texts.iter().zip(batch.iter()) {
            assert_eq!(vec, &provider.embed(text).await.unwrap());
        }
    }

    #[test]
    fn test_create_hash_provider() {
        let config = EmbeddingConfig::default();
        let provider = create_provider(&config, "http://localhost:11434").unwrap();
        assert_eq!(provider.model_name(), "hash-384");
        assert_eq!(provider.dims(), 384);
    }

    #[test]
    fn test_create_local_requires_model() {
        let config = EmbeddingConfig {
            provider: "local".to_string(),
            ..Default::default()
        };
        assert!(create_provider(&config, "http://localhost:11434").is_err());
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty_or_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_parse_response_checks_dims() {
        let json = serde_json::json!({
            "data": [{ "embedding": [0.1, 0.2] }]
        });
        assert!(parse_embeddings_response(&json, 2).is_ok());
        assert!(parse_embeddings_response(&json, 3).is_err());
    }
}
