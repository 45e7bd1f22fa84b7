//! Core error taxonomy.
//!
//! Every failure the pipeline can surface to a caller is one of these
//! variants. The HTTP layer maps them onto status codes; the composer uses
//! the `BackendUnavailable`/`Backend` split to decide whether a retry is
//! worth attempting.

use thiserror::Error;

/// Errors produced by the question answering core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed caller input. Fails fast, never retried.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An empty prompt reached a backend.
    #[error("prompt must not be empty")]
    InvalidPrompt,

    /// Upload rejected before any side effect took place.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Embedding provider failure. Fatal for the current request.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Transient backend failure (connection refused, timeout). Worth one retry.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Non-transient backend failure (bad status, malformed response).
    #[error("backend error: {0}")]
    Backend(String),
}

impl CoreError {
    /// Whether a single same-backend retry is permitted for this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::BackendUnavailable(_))
    }

    /// Machine-readable code used in HTTP error bodies and request logs.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidArgument(_) => "invalid_argument",
            CoreError::InvalidPrompt => "invalid_prompt",
            CoreError::UnsupportedFormat(_) => "unsupported_format",
            CoreError::Embedding(_) => "embedding_error",
            CoreError::BackendUnavailable(_) => "backend_unavailable",
            CoreError::Backend(_) => "backend_error",
        }
    }
}

/// Convenience alias used throughout the core.
pub type CoreResult<T> = Result<T, CoreError>;
