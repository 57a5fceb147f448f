//! OAuth token lifecycle: validity check, refresh, and code exchange.
//!
//! The manager never caches the decoded credential in process state — every
//! [`access_token`](OAuthManager::access_token) call re-reads the store, so a
//! refresh written by a concurrent request (or a fresh login) is picked up
//! immediately. Refresh writes are last-writer-wins.

use std::sync::Arc;

use relay_core::{calculate_expires_at, now_ms};

use crate::errors::AuthError;
use crate::store::CredentialStore;
use crate::types::{CREDENTIAL_KEY, OAuthConfig, OAuthCredential};

/// Token endpoint response.
#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

/// Manages the single OAuth credential against a pluggable store.
pub struct OAuthManager {
    store: Arc<dyn CredentialStore>,
    config: OAuthConfig,
    http: reqwest::Client,
}

impl OAuthManager {
    /// Create a manager over the given store and endpoint configuration.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, config: OAuthConfig) -> Self {
        Self {
            store,
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Endpoint configuration.
    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Current access token, refreshing if expired.
    ///
    /// Returns `Ok(None)` when no usable credential exists: nothing stored,
    /// a non-OAuth record, or an expired token with no refresh secret.
    /// Refresh failures propagate.
    pub async fn access_token(&self) -> Result<Option<String>, AuthError> {
        let Some(cred) = self.store.get(CREDENTIAL_KEY).await else {
            return Ok(None);
        };
        if !cred.is_oauth() {
            return Ok(None);
        }
        if cred.is_valid_at(now_ms()) {
            return Ok(Some(cred.access));
        }
        if cred.refresh.is_empty() {
            return Ok(None);
        }

        tracing::info!("access token expired, refreshing");
        let refreshed = self.refresh(&cred).await?;
        Ok(Some(refreshed.access))
    }

    /// Refresh against the token endpoint and write back the new credential.
    async fn refresh(&self, cred: &OAuthCredential) -> Result<OAuthCredential, AuthError> {
        let body = serde_json::json!({
            "grant_type": "refresh_token",
            "refresh_token": cred.refresh,
            "client_id": self.config.client_id,
        });

        let resp = self.http.post(&self.config.token_url).json(&body).send().await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AuthError::OAuth {
                status,
                message: text,
            });
        }

        let data: TokenResponse = resp.json().await?;
        let new_cred = OAuthCredential::new(
            data.refresh_token.unwrap_or_else(|| cred.refresh.clone()),
            data.access_token,
            calculate_expires_at(data.expires_in),
        );
        self.store.set(CREDENTIAL_KEY, &new_cred).await?;
        Ok(new_cred)
    }

    /// Exchange an authorization code for tokens and persist them.
    pub async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
    ) -> Result<OAuthCredential, AuthError> {
        let body = serde_json::json!({
            "grant_type": "authorization_code",
            "client_id": self.config.client_id,
            "code": code,
            "redirect_uri": self.config.redirect_uri,
            "code_verifier": verifier,
            "state": verifier,
        });

        let resp = self.http.post(&self.config.token_url).json(&body).send().await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AuthError::OAuth {
                status,
                message: text,
            });
        }

        let data: TokenResponse = resp.json().await?;
        let cred = OAuthCredential::new(
            data.refresh_token.unwrap_or_default(),
            data.access_token,
            calculate_expires_at(data.expires_in),
        );
        self.store.set(CREDENTIAL_KEY, &cred).await?;
        Ok(cred)
    }

    /// Build the browser authorization URL for a PKCE challenge.
    ///
    /// The verifier rides along as `state` so the console's code-display page
    /// hands it back as the `#`-suffix of the pasted code.
    #[must_use]
    pub fn authorization_url(&self, challenge: &str, state: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&code_challenge={}&code_challenge_method=S256&state={}",
            self.config.auth_url,
            urlencoded(&self.config.client_id),
            urlencoded(&self.config.redirect_uri),
            urlencoded(&self.config.scopes.join(" ")),
            urlencoded(challenge),
            urlencoded(state),
        )
    }

    /// Whether a usable access token is currently available.
    pub async fn is_authenticated(&self) -> bool {
        matches!(self.access_token().await, Ok(Some(_)))
    }

    /// Remove the stored credential.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.store.remove(CREDENTIAL_KEY).await
    }
}

/// Simple URL encoding for query parameters.
fn urlencoded(s: &str) -> String {
    s.replace('%', "%25")
        .replace(' ', "%20")
        .replace('&', "%26")
        .replace('=', "%3D")
        .replace('+', "%2B")
        .replace('/', "%2F")
        .replace(':', "%3A")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
