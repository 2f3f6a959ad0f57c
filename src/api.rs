//! HTTP server for the chatbot
//!
//! Serves the chat page plus a small JSON API over the same sessions.
//! Browsers are tied to a session through the `session_id` cookie.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::chat::ChatService;
use crate::error::ChatError;
use crate::page::render_page;

pub const SESSION_COOKIE: &str = "session_id";

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatForm {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub chat: Arc<ChatService>,
}

/// =============================
/// Session Cookie Helpers
/// =============================

fn session_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

/// Resolve the caller's session; returns the id and whether a cookie must be set
async fn resolve_session(state: &ApiState, headers: &HeaderMap) -> (Uuid, bool) {
    let requested = session_from_headers(headers);
    let (id, _) = state.chat.open_session(requested).await;
    (id, requested != Some(id))
}

fn with_session_cookie(mut response: Response, id: Uuid, needed: bool) -> Response {
    if needed {
        let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id);
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => warn!("Failed to encode session cookie: {}", e),
        }
    }
    response
}

fn error_status(error: &ChatError) -> StatusCode {
    match error {
        ChatError::MissingCredential => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "credential_configured": state.chat.config().has_credential(),
        "sessions": state.chat.sessions().len().await,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Page Endpoints
/// =============================

async fn index(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    let (id, set_cookie) = resolve_session(&state, &headers).await;
    let view = state.chat.page(id).await;
    with_session_cookie(Html(render_page(&view)).into_response(), id, set_cookie)
}

async fn submit_form(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Form(form): Form<ChatForm>,
) -> Response {
    let (id, set_cookie) = resolve_session(&state, &headers).await;

    // Halting errors are shown by the page itself on the redirect.
    if let Err(e) = state.chat.submit(id, &form.message).await {
        warn!(session_id = %id, "Message not sent: {}", e);
    }

    with_session_cookie(Redirect::to("/").into_response(), id, set_cookie)
}

async fn reset_form(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    let (id, set_cookie) = resolve_session(&state, &headers).await;
    state.chat.reset(id).await;
    with_session_cookie(Redirect::to("/").into_response(), id, set_cookie)
}

/// =============================
/// JSON Endpoints
/// =============================

/// Read-only: a caller without a known session gets an empty transcript
/// and no new session.
async fn list_messages(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    let known = match session_from_headers(&headers) {
        Some(id) => state.chat.sessions().get(id).await.map(|_| id),
        None => None,
    };

    let messages = match known {
        Some(id) => state.chat.transcript(id).await,
        None => Vec::new(),
    };

    let body = Json(ApiResponse::success(serde_json::json!({
        "session_id": known.map(|id| id.to_string()),
        "messages": messages,
    })));
    (StatusCode::OK, body).into_response()
}

async fn chat_handler(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("Rejected chat payload: {}", rejection.body_text());
            let body =
                ApiResponse::error(format!("Invalid request body: {}", rejection.body_text()));
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    let (id, set_cookie) = resolve_session(&state, &headers).await;
    info!(session_id = %id, "Received chat message");

    let (status, body) = match state.chat.submit(id, &req.message).await {
        Ok(Some(turn)) => (
            StatusCode::OK,
            ApiResponse::success(serde_json::json!({
                "session_id": id.to_string(),
                "user": turn.user,
                "assistant": turn.assistant,
                "failed": turn.failed,
            })),
        ),
        Ok(None) => (
            StatusCode::BAD_REQUEST,
            ApiResponse::error("Message must not be empty".to_string()),
        ),
        Err(e) => (error_status(&e), ApiResponse::error(e.to_string())),
    };

    with_session_cookie((status, Json(body)).into_response(), id, set_cookie)
}

async fn reset_handler(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    let (id, set_cookie) = resolve_session(&state, &headers).await;
    state.chat.reset(id).await;

    let body = Json(ApiResponse::success(serde_json::json!({
        "session_id": id.to_string(),
        "messages": [],
    })));
    with_session_cookie((StatusCode::OK, body).into_response(), id, set_cookie)
}

/// =============================
/// Router
/// =============================

pub fn create_router(chat: Arc<ChatService>) -> Router {
    let state = ApiState { chat };

    Router::new()
        .route("/", get(index))
        .route("/chat", post(submit_form))
        .route("/reset", post(reset_form))
        .route("/health", get(health))
        .route("/api/messages", get(list_messages))
        .route("/api/chat", post(chat_handler))
        .route("/api/reset", post(reset_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(chat: Arc<ChatService>) -> crate::Result<()> {
    let addr = format!("{}:{}", chat.config().bind_addr, chat.config().port);
    let port = chat.config().port;
    let router = create_router(chat);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Chat server listening on http://{}", addr);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_parsing() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; session_id={}; other=1", id)).unwrap(),
        );
        assert_eq!(session_from_headers(&headers), Some(id));
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(error_status(&ChatError::MissingCredential), StatusCode::UNAUTHORIZED);
        assert_eq!(
            error_status(&ChatError::Initialization("bad model".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            error_status(&ChatError::Config("unused".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_garbage_cookie_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session_id=not-a-uuid"));
        assert_eq!(session_from_headers(&headers), None);
        assert_eq!(session_from_headers(&HeaderMap::new()), None);
    }
}
