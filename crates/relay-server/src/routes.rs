//! Router wiring.

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::errors::ProxyError;
use crate::login;
use crate::models;
use crate::pipeline;
use crate::state::AppState;

/// Max inbound body size. Chat histories with large contexts get close to
/// this; the upstream enforces its own limits beyond it.
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Build the full router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(login::serve_login_page))
        .route("/index.html", get(login::serve_login_page))
        .route("/auth/oauth/start", post(login::oauth_start))
        .route("/auth/oauth/callback", post(login::oauth_callback))
        .route("/auth/login/start", post(login::login_start))
        .route("/auth/logout", get(login::logout))
        .route("/auth/status", get(login::auth_status))
        .route("/v1", get(service_status))
        .route("/v1/models", get(models::model_list))
        .route(
            "/v1/chat/completions",
            post(chat_completions).get(chat_method_not_allowed),
        )
        .route(
            "/v1/messages",
            post(messages_handler).get(chat_method_not_allowed),
        )
        .fallback(unknown_route)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST `/v1/chat/completions` — always translated to OpenAI format.
async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, ProxyError> {
    pipeline::handle_chat(state, true, headers, body).await
}

/// POST `/v1/messages` — passthrough unless the body smells OpenAI-shaped.
async fn messages_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, ProxyError> {
    pipeline::handle_chat(state, false, headers, body).await
}

/// GET on the chat paths.
async fn chat_method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": {
                "type": "invalid_request_error",
                "message": "This endpoint only accepts POST. Point your client's base URL at this proxy and send chat completions.",
            }
        })),
    )
        .into_response()
}

/// GET `/v1` — service status.
async fn service_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "claude-relay",
        "version": env!("CARGO_PKG_VERSION"),
        "authenticated": state.oauth.is_authenticated().await,
        "thinking_cache": {
            "persistent": state.cache.has_persistent_tier(),
        },
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Anything unrouted.
async fn unknown_route() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "not found",
            "available_endpoints": [
                "GET /",
                "POST /auth/oauth/start",
                "POST /auth/oauth/callback",
                "POST /auth/login/start",
                "GET /auth/logout",
                "GET /auth/status",
                "GET /v1",
                "GET /v1/models",
                "POST /v1/chat/completions",
                "POST /v1/messages",
            ],
        })),
    )
        .into_response()
}
