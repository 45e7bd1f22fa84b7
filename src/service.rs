//! Application context and the core's caller-facing entry points.
//!
//! [`AppContext`] is the explicit, passed-in process state: the configured
//! backend and embedding provider, the in-memory vector index and document
//! registry, the session store, and the health monitor. It starts empty
//! and holds nothing across restarts.
//!
//! The entry points (`chat`, `ask`, `upload_document`, `health`, `stats`,
//! `clear_session`) are plain async functions; the HTTP layer and the CLI
//! are thin callers.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::backend::{self, LlmBackend};
use crate::chunk;
use crate::compose::{self, AnswerMode};
use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::{CoreError, CoreResult};
use crate::health::HealthMonitor;
use crate::index::VectorIndex;
use crate::models::{AnswerResult, Document, HealthSnapshot, ServiceStats, UploadReceipt};
use crate::session::SessionStore;

/// Process-wide application state. Initialized empty; dropped on shutdown.
pub struct AppContext {
    pub config: Config,
    pub backend: Arc<dyn LlmBackend>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub index: RwLock<VectorIndex>,
    pub documents: RwLock<HashMap<String, Document>>,
    pub sessions: SessionStore,
    pub monitor: HealthMonitor,
}

impl AppContext {
    /// Build the context from configuration, constructing the configured
    /// backend and embedding provider.
    pub fn new(config: Config) -> CoreResult<Self> {
        let backend: Arc<dyn LlmBackend> = Arc::from(backend::create_backend(&config.backend)?);
        let embedder: Arc<dyn EmbeddingProvider> = Arc::from(embedding::create_provider(
            &config.embedding,
            &config.backend.base_url,
        )?);
        Ok(Self::with_parts(config, backend, embedder))
    }

    /// Build the context around caller-supplied backend and embedder.
    /// Used by tests and by embedders of the library that bring their own
    /// implementations.
    pub fn with_parts(
        config: Config,
        backend: Arc<dyn LlmBackend>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let index = RwLock::new(VectorIndex::new(embedder.dims()));
        let sessions = SessionStore::new(config.session.max_turns);
        Self {
            config,
            backend,
            embedder,
            index,
            documents: RwLock::new(HashMap::new()),
            sessions,
            monitor: HealthMonitor::default(),
        }
    }

    /// Plain chat: session history plus the message, no document retrieval.
    pub async fn chat(&self, message: &str, session_id: Option<&str>) -> CoreResult<AnswerResult> {
        compose::answer(self, message, session_id, AnswerMode::Chat).await
    }

    /// Retrieval-augmented answering over the uploaded documents.
    pub async fn ask(&self, question: &str, session_id: Option<&str>) -> CoreResult<AnswerResult> {
        compose::answer(self, question, session_id, AnswerMode::Rag).await
    }

    /// Ingest one document: validate, chunk, embed, and index.
    ///
    /// Embeddings are computed before the index lock is taken, and all of
    /// the document's chunks are inserted under one write lock, so a
    /// concurrent search sees either the whole document or none of it. On
    /// any error nothing is indexed.
    pub async fn upload_document(
        &self,
        filename: &str,
        content: &[u8],
    ) -> CoreResult<UploadReceipt> {
        let lower = filename.to_lowercase();
        if !lower.ends_with(".txt") && !lower.ends_with(".md") {
            return Err(CoreError::UnsupportedFormat(
                "only .txt and .md files are supported".into(),
            ));
        }

        let text = std::str::from_utf8(content).map_err(|_| {
            CoreError::UnsupportedFormat("file content is not valid UTF-8 text".into())
        })?;

        if text.trim().is_empty() {
            return Err(CoreError::InvalidArgument("file is empty".into()));
        }

        let document = Document {
            id: Uuid::new_v4().to_string(),
            filename: filename.to_string(),
            text: text.to_string(),
            hash: chunk::text_hash(text),
            uploaded_at: Utc::now(),
        };

        let chunks = chunk::chunk_document(
            &document.id,
            text,
            self.config.chunking.max_chars,
            self.config.chunking.overlap_chars,
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        self.index
            .write()
            .unwrap()
            .insert_all(chunks.into_iter().zip(embeddings).collect())?;

        let total_documents = {
            let mut documents = self.documents.write().unwrap();
            documents.insert(document.id.clone(), document);
            documents.len()
        };

        tracing::info!(
            filename = %filename,
            size = text.len(),
            total_documents,
            "document indexed"
        );

        Ok(UploadReceipt {
            filename: filename.to_string(),
            size: text.len(),
            total_documents,
        })
    }

    /// Drop one session's history. Returns whether it existed.
    pub fn clear_session(&self, session_id: &str) -> bool {
        let cleared = self.sessions.clear(session_id);
        if cleared {
            tracing::info!(session_id = %session_id, "session cleared");
        }
        cleared
    }

    /// Aggregated status snapshot. Never fails: an unreachable backend
    /// shows up as `backend_reachable = false` and `status = "degraded"`.
    pub async fn health(&self) -> HealthSnapshot {
        let backend_health = self.monitor.check(&self.backend).await;
        HealthSnapshot {
            status: if backend_health.reachable {
                "healthy".to_string()
            } else {
                "degraded".to_string()
            },
            backend_reachable: backend_health.reachable,
            model_name: self.backend.model_name().to_string(),
            documents_loaded: self.documents.read().unwrap().len(),
            active_sessions: self.sessions.len(),
        }
    }

    /// Detailed service statistics.
    pub async fn stats(&self) -> ServiceStats {
        let backend_health = self.monitor.check(&self.backend).await;
        ServiceStats {
            backend: self.backend.name().to_string(),
            model_name: self.backend.model_name().to_string(),
            embedding_model: self.embedder.model_name().to_string(),
            embedding_dims: self.embedder.dims(),
            documents_loaded: self.documents.read().unwrap().len(),
            chunks_indexed: self.index.read().unwrap().size(),
            active_sessions: self.sessions.len(),
            backend_reachable: backend_health.reachable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::embedding::HashProvider;

    fn mock_context(responses: Vec<String>) -> AppContext {
        let mut config = Config::default();
        config.backend.provider = "mock".to_string();
        let backend = Arc::new(MockBackend::new("mock-model".into(), responses, true));
        let embedder = Arc::new(HashProvider::new(64));
        AppContext::with_parts(config, backend, embedder)
    }

    #[tokio::test]
    async fn test_upload_rejects_unsupported_extension() {
        let ctx = mock_context(vec!["ok".into()]);
        let err = ctx.upload_document("doc.pdf", b"content").await.unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedFormat(_)));
        assert_eq!(ctx.index.read().unwrap().size(), 0);
    }

    #[tokio::test]
    async fn test_upload_rejects_binary_content() {
        let ctx = mock_context(vec!["ok".into()]);
        let err = ctx
            .upload_document("doc.txt", &[0xff, 0xfe, 0x00, 0x01])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_file() {
        let ctx = mock_context(vec!["ok".into()]);
        let err = ctx.upload_document("doc.txt", b"   \n").await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
        assert_eq!(ctx.documents.read().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_failed_upload_indexes_nothing() {
        use async_trait::async_trait;

        // Reports one dimensionality but emits another, so the index
        // rejects the batch after embedding succeeded.
        struct SkewedEmbedder;

        #[async_trait]
        impl EmbeddingProvider for SkewedEmbedder {
            fn model_name(&self) -> &str {
                "skewed"
            }
            fn dims(&self) -> usize {
                4
            }
            async fn embed(&self, _text: &str) -> crate::error::CoreResult<Vec<f32>> {
                Ok(vec![0.5; 3])
            }
        }

        let config = Config::default();
        let backend = Arc::new(MockBackend::new("m".into(), vec!["ok".into()], true));
        let ctx = AppContext::with_parts(config, backend, Arc::new(SkewedEmbedder));

        let err = ctx
            .upload_document("doc.txt", b"some document text")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
        assert_eq!(ctx.index.read().unwrap().size(), 0);
        assert_eq!(ctx.documents.read().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_upload_indexes_chunks() {
        let ctx = mock_context(vec!["ok".into()]);
        let receipt = ctx
            .upload_document("exemplo.txt", "Machine Learning é uma subárea da IA.".as_bytes())
            .await
            .unwrap();
        assert_eq!(receipt.filename, "exemplo.txt");
        assert_eq!(receipt.total_documents, 1);
        assert!(ctx.index.read().unwrap().size() >= 1);
    }

    #[tokio::test]
    async fn test_reupload_counts_as_new_document() {
        let ctx = mock_context(vec!["ok".into()]);
        let body = "Conteúdo idêntico.".as_bytes();
        ctx.upload_document("a.txt", body).await.unwrap();
        let receipt = ctx.upload_document("a.txt", body).await.unwrap();
        assert_eq!(receipt.total_documents, 2);
    }

    #[tokio::test]
    async fn test_clear_session() {
        let ctx = mock_context(vec!["resposta".into()]);
        let result = ctx.chat("oi", Some("s1")).await.unwrap();
        assert_eq!(result.session_id, "s1");
        assert!(ctx.clear_session("s1"));
        assert!(!ctx.clear_session("s1"));
    }

    #[tokio::test]
    async fn test_stats_reflects_state() {
        let ctx = mock_context(vec!["ok".into()]);
        ctx.upload_document("a.txt", b"some text here").await.unwrap();
        ctx.chat("oi", Some("s1")).await.unwrap();

        let stats = ctx.stats().await;
        assert_eq!(stats.backend, "mock");
        assert_eq!(stats.documents_loaded, 1);
        assert!(stats.chunks_indexed >= 1);
        assert_eq!(stats.active_sessions, 1);
        assert!(stats.backend_reachable);
    }
}
