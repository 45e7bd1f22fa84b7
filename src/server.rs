//! Thin HTTP layer over the question answering core.
//!
//! Routes call the plain entry points on [`AppContext`] and translate
//! [`CoreError`] values into a JSON error contract:
//!
//! ```json
//! { "error": { "code": "backend_unavailable", "message": "..." } }
//! ```
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/v1/chat` | Chat with session memory |
//! | `POST` | `/api/v1/ask` | Question answering over uploaded documents |
//! | `POST` | `/api/v1/upload-document` | Multipart upload of a `.txt`/`.md` file |
//! | `GET`  | `/api/v1/health` | Health snapshot (always 200) |
//! | `GET`  | `/api/v1/stats` | Detailed service statistics |
//! | `DELETE` | `/api/v1/session/{id}` | Clear one session's history |
//! | `GET`  | `/` | Service info and endpoint listing |
//!
//! All origins, methods, and headers are permitted (browser clients).

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::CoreError;
use crate::models::{AnswerResult, HealthSnapshot, ServiceStats};
use crate::service::AppContext;

/// Start the HTTP server on the configured bind address.
///
/// Builds the [`AppContext`] from configuration and serves until the
/// process is terminated.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let ctx = Arc::new(AppContext::new(config).map_err(|e| anyhow::anyhow!(e))?);
    run_server_with_context(&bind_addr, ctx).await
}

/// Start the HTTP server around a caller-built [`AppContext`].
pub async fn run_server_with_context(bind_addr: &str, ctx: Arc<AppContext>) -> anyhow::Result<()> {
    let app = router(ctx);

    println!("askd listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the axum router. Exposed separately so tests can drive the
/// service without binding a socket.
pub fn router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/api/v1/chat", post(handle_chat))
        .route("/api/v1/ask", post(handle_ask))
        .route("/api/v1/upload-document", post(handle_upload))
        .route("/api/v1/health", get(handle_health))
        .route("/api/v1/stats", get(handle_stats))
        .route("/api/v1/session/{id}", delete(handle_clear_session))
        .layer(cors)
        .with_state(ctx)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let status = match &err {
            CoreError::InvalidArgument(_)
            | CoreError::InvalidPrompt
            | CoreError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            CoreError::Embedding(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Backend(_) => StatusCode::BAD_GATEWAY,
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

// ============ GET / ============

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "askd",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "chat": "/api/v1/chat",
            "ask": "/api/v1/ask",
            "upload": "/api/v1/upload-document",
            "health": "/api/v1/health",
            "stats": "/api/v1/stats",
        },
    }))
}

// ============ POST /api/v1/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    answer: String,
    latency_ms: u64,
    session_id: String,
    timestamp: chrono::DateTime<chrono::Utc>,
}

async fn handle_chat(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let result = ctx
        .chat(&request.message, request.session_id.as_deref())
        .await?;
    Ok(Json(ChatResponse {
        answer: result.answer,
        latency_ms: result.latency_ms,
        session_id: result.session_id,
        timestamp: result.timestamp,
    }))
}

// ============ POST /api/v1/ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    session_id: Option<String>,
}

async fn handle_ask(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AnswerResult>, AppError> {
    let result = ctx
        .ask(&request.question, request.session_id.as_deref())
        .await?;
    Ok(Json(result))
}

// ============ POST /api/v1/upload-document ============

#[derive(Serialize)]
struct UploadResponse {
    message: String,
    filename: String,
    size: usize,
    total_documents: usize,
}

async fn handle_upload(
    State(ctx): State<Arc<AppContext>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| bad_request("file field is missing a filename"))?;

        let data = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read file field: {}", e)))?;

        let receipt = ctx.upload_document(&filename, &data).await?;
        return Ok(Json(UploadResponse {
            message: format!("Document {} indexed", receipt.filename),
            filename: receipt.filename,
            size: receipt.size,
            total_documents: receipt.total_documents,
        }));
    }

    Err(bad_request("multipart field 'file' is required"))
}

// ============ GET /api/v1/health ============

async fn handle_health(State(ctx): State<Arc<AppContext>>) -> Json<HealthSnapshot> {
    Json(ctx.health().await)
}

// ============ GET /api/v1/stats ============

async fn handle_stats(State(ctx): State<Arc<AppContext>>) -> Json<ServiceStats> {
    Json(ctx.stats().await)
}

// ============ DELETE /api/v1/session/{id} ============

async fn handle_clear_session(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if ctx.clear_session(&id) {
        Ok(Json(serde_json::json!({
            "message": format!("Session {} cleared", id)
        })))
    } else {
        Err(not_found(format!("no session with id: {}", id)))
    }
}
