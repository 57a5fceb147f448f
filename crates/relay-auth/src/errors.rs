//! Auth error types.

/// Errors that can occur during credential operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// OAuth token exchange or refresh failed.
    #[error("OAuth error ({status}): {message}")]
    OAuth {
        /// HTTP status code (0 if no response).
        status: u16,
        /// Error description.
        message: String,
    },

    /// Remote key-value store rejected a write.
    #[error("credential store error: {0}")]
    Store(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
