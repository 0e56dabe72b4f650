//! HTTP API v1: threads and tools.
//!
//! Endpoints:
//!
//! - `GET  /v1/threads`                : List thread ids
//! - `GET  /v1/threads/{id}/messages`  : Latest checkpointed history
//! - `POST /v1/threads/{id}/messages`  : Send a message, get the answer
//! - `GET  /v1/tools`                  : List available tools

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use parley_agent::ConversationService;
use parley_core::error::Error;
use parley_core::message::{Message, ThreadId};
use parley_core::provider::ToolDefinition;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

pub type SharedService = Arc<ConversationService>;

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(service: SharedService) -> Router {
    Router::new()
        .route("/threads", get(list_threads_handler))
        .route(
            "/threads/{id}/messages",
            get(get_messages_handler).post(send_message_handler),
        )
        .route("/tools", get(list_tools_handler))
        .with_state(service)
}

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A turn error rendered as an HTTP response.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

/// Map a turn error to the status a client should see.
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::ThreadBusy(_) => StatusCode::CONFLICT,
        Error::ModelUnavailable(_) => StatusCode::BAD_GATEWAY,
        Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        Error::ToolLoopExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            warn!(status = %status, error = %self.0, "Request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadListResponse {
    pub threads: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadMessagesResponse {
    pub thread_id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub thread_id: String,
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolDefinition>,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn list_threads_handler(
    State(service): State<SharedService>,
) -> Result<Json<ThreadListResponse>, ApiError> {
    let threads = service.list_threads().await?;
    Ok(Json(ThreadListResponse {
        threads: threads.into_iter().map(|t| t.0).collect(),
    }))
}

async fn get_messages_handler(
    State(service): State<SharedService>,
    Path(id): Path<String>,
) -> Result<Json<ThreadMessagesResponse>, ApiError> {
    let messages = service.history(&ThreadId(id.clone())).await?;
    Ok(Json(ThreadMessagesResponse {
        thread_id: id,
        messages,
    }))
}

async fn send_message_handler(
    State(service): State<SharedService>,
    Path(id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let thread_id = ThreadId(id);
    info!(thread_id = %thread_id, "Message received");
    let answer = service.send(&thread_id, &body.content).await?;
    Ok(Json(SendMessageResponse {
        thread_id: thread_id.0,
        answer,
    }))
}

async fn list_tools_handler(State(service): State<SharedService>) -> Json<ToolListResponse> {
    Json(ToolListResponse {
        tools: service.tool_definitions().to_vec(),
    })
}
