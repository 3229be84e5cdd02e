//! HTTP API.
//!
//! - GET  /          landing page
//! - POST /api/chat  streamed plain-text reply
//! - GET  /static/*  front-end assets
//! - GET  /health
//! - GET  /metrics

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{self, HeaderName};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::metrics::Metrics;
use crate::relay::Relay;

const INDEX_HTML: &str = include_str!("../../static/index.html");

pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// Application state shared across handlers.
pub struct AppState {
    pub relay: Relay,
    pub metrics: Metrics,
    pub start_time: Instant,
}

/// Build the axum router with all routes.
pub fn build_router(state: Arc<AppState>, server: &ServerConfig) -> Router {
    let router = Router::new()
        .route("/", get(index))
        .route("/api/chat", post(chat))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .nest_service("/static", ServeDir::new(&server.static_dir))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if server.allow_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

// ─── Request/Response Types ────────────────────────────────────────────────

/// Body of POST /api/chat.
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

impl ChatRequest {
    /// Parse a raw body. Anything that is not a JSON object with a string
    /// `message` counts as an empty request.
    pub fn parse(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    /// The trimmed message, if it is non-empty.
    pub fn validated(self) -> Option<String> {
        let message = self.message?;
        let trimmed = message.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("No message provided")]
    NoMessage,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = match self {
            ChatError::NoMessage => StatusCode::BAD_REQUEST,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub provider_available: bool,
    pub credential_configured: bool,
    pub model: String,
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn chat(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response, ChatError> {
    let Some(message) = ChatRequest::parse(&body).validated() else {
        state.metrics.record_request(false);
        return Err(ChatError::NoMessage);
    };
    state.metrics.record_request(true);

    let request_id = Uuid::new_v4().to_string();
    info!(
        request_id = request_id,
        chars = message.chars().count(),
        "Chat request"
    );

    let fragments = state.relay.open(request_id.clone(), message);
    let body = Body::from_stream(fragments.map(Ok::<_, Infallible>));

    Ok((
        [
            (header::CONTENT_TYPE, TEXT_PLAIN_UTF8.to_string()),
            (HeaderName::from_static("x-request-id"), request_id),
        ],
        body,
    )
        .into_response())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        provider_available: state.relay.provider_available(),
        credential_configured: state.relay.credential_configured(),
        model: state.relay.model().to_string(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, StatusCode> {
    let text = state
        .metrics
        .render()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], text))
}
