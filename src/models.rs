//! Core data models used throughout askd.
//!
//! These types represent the documents, chunks, conversation turns, and
//! answer results that flow through the ingestion and answering pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// An uploaded document. Immutable once stored; lives for the process only.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub text: String,
    /// SHA-256 of the raw text, for spotting identical re-uploads.
    pub hash: String,
    pub uploaded_at: DateTime<Utc>,
}

/// A bounded excerpt of one document's text, the unit of indexing and citation.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    /// Byte offset of the chunk's first character in the document text.
    /// Strictly increasing within a document.
    pub offset: usize,
    pub hash: String,
}

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One message in a session's history.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// A retrieved passage with its citation label.
#[derive(Debug, Clone)]
pub struct Passage {
    pub chunk_id: String,
    pub filename: String,
    pub text: String,
    pub score: f32,
}

impl Passage {
    /// Citation string surfaced to callers: `[filename] excerpt…`.
    pub fn citation(&self) -> String {
        const EXCERPT_LEN: usize = 200;
        let excerpt: String = self.text.chars().take(EXCERPT_LEN).collect();
        if self.text.chars().count() > EXCERPT_LEN {
            format!("[{}] {}...", self.filename, excerpt)
        } else {
            format!("[{}] {}", self.filename, excerpt)
        }
    }
}

/// The result of one answered request. Produced fresh per request.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub answer: String,
    pub sources: Vec<String>,
    pub latency_ms: u64,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Reachability of the configured backend at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct BackendHealth {
    pub backend_name: String,
    pub reachable: bool,
    pub checked_at: DateTime<Utc>,
}

/// Aggregated health status returned by `health()`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: String,
    pub backend_reachable: bool,
    pub model_name: String,
    pub documents_loaded: usize,
    pub active_sessions: usize,
}

/// Detailed service statistics returned by `stats()`.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub backend: String,
    pub model_name: String,
    pub embedding_model: String,
    pub embedding_dims: usize,
    pub documents_loaded: usize,
    pub chunks_indexed: usize,
    pub active_sessions: usize,
    pub backend_reachable: bool,
}

/// Receipt returned after a successful document upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub filename: String,
    pub size: usize,
    pub total_documents: usize,
}
