//! HTTP surface for the answering core.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat/stream` | Stream one answer; final chunk is the integrity stamp marker |
//! | `POST` | `/knowledge/refresh` | Rebuild the index snapshot from the corpus store |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! The chat response is an incremental text stream: answer chunks in
//! provider order, then the stamp marker (`\n\n[🛡️ HASH: ... | TIMESTAMP:
//! ...]`) as the final chunk. A provider failure before the first chunk is
//! reported as a JSON error; a mid-stream failure terminates the body early
//! without the stamp marker.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `completion_failed` (502),
//! `refresh_failed` (503), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser
//! clients.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::completion::{create_provider, CompletionProvider};
use crate::config::Config;
use crate::db;
use crate::index::Bm25Params;
use crate::knowledge::{KnowledgeBase, SqliteCorpusSource};
use crate::memory::{ConversationMemory, SqliteMemoryStore};
use crate::pipeline::stamped_stream;
use crate::prompt::assemble;
use crate::retrieve::retrieve;
use crate::tokenize::{SyllableTokenizer, Tokenizer};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub knowledge: Arc<KnowledgeBase>,
    pub memory: Arc<dyn ConversationMemory>,
    pub provider: Arc<dyn CompletionProvider>,
    pub tokenizer: Arc<dyn Tokenizer>,
}

/// Build the router over an explicit state.
///
/// Kept separate from [`run_server`] so tests can drive the router
/// in-process with mock collaborators.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat/stream", post(handle_chat_stream))
        .route("/knowledge/refresh", post(handle_refresh))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server with real collaborators.
///
/// Connects to SQLite, constructs the knowledge base, performs an initial
/// refresh (a failure leaves an empty snapshot and is logged, not fatal),
/// and serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = Arc::new(config.clone());

    let pool = db::connect(&config.db).await?;
    let tokenizer: Arc<dyn Tokenizer> = Arc::new(SyllableTokenizer);
    let knowledge = Arc::new(KnowledgeBase::new(
        Arc::new(SqliteCorpusSource::new(pool.clone())),
        tokenizer.clone(),
        Bm25Params {
            k1: config.retrieval.bm25_k1,
            b: config.retrieval.bm25_b,
        },
    ));

    match knowledge.refresh().await {
        Ok(outcome) => info!(documents = outcome.documents, "initial index built"),
        Err(e) => warn!(error = %e, "initial index build failed; serving with empty corpus"),
    }

    let state = AppState {
        config: config.clone(),
        knowledge,
        memory: Arc::new(SqliteMemoryStore::new(pool)),
        provider: create_provider(&config.completion)?,
        tokenizer,
    };

    let app = build_router(state);

    info!("server listening on http://{}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn completion_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "completion_failed".to_string(),
        message: message.into(),
    }
}

fn refresh_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "refresh_failed".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /chat/stream ============

/// JSON request body for `POST /chat/stream`.
#[derive(Deserialize)]
pub struct ChatRequest {
    /// Conversation identifier for memory lookup; defaults to `"1"`.
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// The new user message.
    pub message: String,
}

/// Handler for `POST /chat/stream`.
///
/// Retrieval → history lookup → prompt assembly → streamed, stamped answer.
/// Empty retrieval and unavailable history both degrade; only a provider
/// failure before the first chunk is surfaced as an HTTP error.
async fn handle_chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, AppError> {
    if request.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }
    let conversation_id = request.conversation_id.unwrap_or_else(|| "1".to_string());

    // Capture the snapshot once; a concurrent refresh does not disturb this
    // request.
    let snapshot = state.knowledge.snapshot();
    let hits = retrieve(
        &snapshot,
        state.tokenizer.as_ref(),
        &request.message,
        state.config.retrieval.top_k,
    );

    let history = match state.memory.history(&conversation_id).await {
        Ok(turns) => turns,
        Err(e) => {
            warn!(conversation_id = %conversation_id, error = %e,
                "memory lookup failed; continuing without history");
            Vec::new()
        }
    };

    let prompt = assemble(&request.message, &hits, &history);

    let completion = state
        .provider
        .stream_completion(&prompt)
        .await
        .map_err(|e| completion_failed(e.to_string()))?;

    let body = Body::from_stream(stamped_stream(completion).map(|item| {
        item.map(Bytes::from)
            .map_err(|e| std::io::Error::other(e.to_string()))
    }));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .map_err(|e| AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal".to_string(),
            message: e.to_string(),
        })
}

// ============ POST /knowledge/refresh ============

#[derive(Serialize)]
struct RefreshResponse {
    status: String,
    documents: usize,
}

/// Handler for `POST /knowledge/refresh`.
///
/// Synchronous: responds only once the new snapshot is published (or the
/// rebuild failed, in which case the previous snapshot keeps serving).
/// Idempotent and safe to call concurrently with in-flight chats.
async fn handle_refresh(State(state): State<AppState>) -> Result<Json<RefreshResponse>, AppError> {
    let outcome = state
        .knowledge
        .refresh()
        .await
        .map_err(|e| refresh_failed(e.to_string()))?;

    Ok(Json(RefreshResponse {
        status: "ok".to_string(),
        documents: outcome.documents,
    }))
}
