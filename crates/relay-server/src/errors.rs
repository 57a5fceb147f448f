//! The proxy error taxonomy, shaped into HTTP responses.
//!
//! Cache and injection failures are deliberately absent: they degrade and log
//! but never surface to the client.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Errors the request pipeline can surface to a client.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// No credential, or an expired one with no refresh path.
    #[error("not authenticated")]
    AuthMissing,

    /// Upstream rejected our bearer.
    #[error("upstream rejected authentication: {0}")]
    AuthRejected(String),

    /// Any other upstream non-2xx; body passes through as text.
    #[error("upstream returned {status}")]
    Upstream {
        /// Upstream status code.
        status: u16,
        /// Raw upstream body.
        body: String,
    },

    /// Selective-gateway rejection of a non-Claude model.
    #[error("model not supported: {0}")]
    ModelUnsupported(String),

    /// Inbound bearer did not match the configured `API_KEY`.
    #[error("invalid inbound API key")]
    InvalidApiKey,

    /// Malformed client request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Unexpected failure inside the pipeline.
    #[error("proxy error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// The HTTP status this error maps to.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::AuthMissing | Self::AuthRejected(_) | Self::InvalidApiKey => {
                StatusCode::UNAUTHORIZED
            }
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::ModelUnsupported(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::AuthMissing => (
                status,
                Json(json!({
                    "error": {
                        "type": "authentication_error",
                        "message": "Not authenticated. Open the proxy root page and log in first.",
                    }
                })),
            )
                .into_response(),

            Self::AuthRejected(detail) => (
                status,
                Json(json!({
                    "error": {
                        "type": "authentication_error",
                        "message": format!(
                            "Upstream authentication failed — the token may be expired. Re-authenticate and retry. {detail}"
                        ),
                    }
                })),
            )
                .into_response(),

            Self::InvalidApiKey => (
                status,
                Json(json!({
                    "error": {
                        "type": "authentication_error",
                        "message": "Invalid API key.",
                    }
                })),
            )
                .into_response(),

            // Raw passthrough, original status.
            Self::Upstream { body, .. } => (status, body).into_response(),

            Self::ModelUnsupported(model) => (
                status,
                Json(json!({
                    "error": {
                        "type": "invalid_request_error",
                        "code": "model_not_supported_by_proxy",
                        "message": format!(
                            "Model '{model}' is not served by this proxy. Use a Claude model or your provider's default."
                        ),
                    }
                })),
            )
                .into_response(),

            Self::BadRequest(message) => (
                status,
                Json(json!({
                    "error": { "type": "invalid_request_error", "message": message }
                })),
            )
                .into_response(),

            Self::Internal(message) => (
                status,
                Json(json!({
                    "error": { "type": "api_error", "message": format!("Proxy error: {message}") }
                })),
            )
                .into_response(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
