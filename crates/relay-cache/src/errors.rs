//! Cache error types.
//!
//! Persistent-tier failures never fail a request: callers log them and carry
//! on with the local tier.

/// Errors from the persistent cache tier.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Remote store rejected the operation.
    #[error("cache store error: {0}")]
    Store(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = CacheError::Store("setex returned 500".to_string());
        assert!(err.to_string().contains("setex returned 500"));
    }
}
