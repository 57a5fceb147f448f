//! Credential record and OAuth endpoint configuration.

use serde::{Deserialize, Serialize};

/// Store key under which the single credential record lives.
pub const CREDENTIAL_KEY: &str = "anthropic";

/// Discriminator value for OAuth credential records.
pub const OAUTH_RECORD_TYPE: &str = "oauth";

/// Default OAuth client id for the developer console.
pub const DEFAULT_CLIENT_ID: &str = "9d1c250a-e61b-44d9-88ed-5944d1962f5e";

/// A persisted OAuth credential.
///
/// `expires` is an absolute instant in milliseconds since the epoch, never a
/// duration. A credential equal to `now` is already expired (strict
/// greater-than check).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthCredential {
    /// Record discriminator, always `"oauth"`.
    #[serde(rename = "type")]
    pub record_type: String,
    /// Refresh secret.
    pub refresh: String,
    /// Current access token.
    pub access: String,
    /// Absolute expiry in milliseconds since the epoch.
    pub expires: i64,
}

impl OAuthCredential {
    /// Create an OAuth credential record.
    #[must_use]
    pub fn new(refresh: impl Into<String>, access: impl Into<String>, expires: i64) -> Self {
        Self {
            record_type: OAUTH_RECORD_TYPE.to_string(),
            refresh: refresh.into(),
            access: access.into(),
            expires,
        }
    }

    /// Whether the record carries the OAuth discriminator.
    #[must_use]
    pub fn is_oauth(&self) -> bool {
        self.record_type == OAUTH_RECORD_TYPE
    }

    /// Whether the access token is still valid at `now_ms`.
    ///
    /// Strict: a token whose expiry equals `now_ms` is expired.
    #[must_use]
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        self.expires > now_ms
    }
}

/// OAuth endpoint configuration for the developer console.
#[derive(Clone, Debug)]
pub struct OAuthConfig {
    /// Browser authorization URL.
    pub auth_url: String,
    /// Token exchange/refresh endpoint.
    pub token_url: String,
    /// Redirect URI registered for the console code-display page.
    pub redirect_uri: String,
    /// OAuth client id.
    pub client_id: String,
    /// Requested scopes.
    pub scopes: Vec<String>,
}

/// Default console endpoints.
///
/// The client id can be overridden via `ANTHROPIC_OAUTH_CLIENT_ID`; the
/// server config layer passes the override through
/// [`OAuthConfig::with_client_id`].
#[must_use]
pub fn default_config() -> OAuthConfig {
    OAuthConfig {
        auth_url: "https://console.anthropic.com/oauth/authorize".to_string(),
        token_url: "https://console.anthropic.com/v1/oauth/token".to_string(),
        redirect_uri: "https://console.anthropic.com/oauth/code/callback".to_string(),
        client_id: DEFAULT_CLIENT_ID.to_string(),
        scopes: vec![
            "org:create_api_key".to_string(),
            "user:profile".to_string(),
            "user:inference".to_string(),
        ],
    }
}

impl OAuthConfig {
    /// Replace the client id (environment override).
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
