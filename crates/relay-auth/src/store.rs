//! Pluggable credential persistence.
//!
//! Two backends, selected once at startup:
//! - [`FileCredentialStore`] — a pretty-printed `{key: credential}` JSON map
//!   at `.auth_data.json` in the working directory. Each read and write is an
//!   atomic open-read-close / open-write-close; no handle is kept open.
//! - [`RestCredentialStore`] — a remote REST key-value service (Upstash
//!   convention: `GET /get/<key>`, `POST /set/<key>`, `GET /del/<key>`, all
//!   bearer-authenticated, responses wrapped in `{"result": ...}`).
//!
//! Read failures degrade to "not found"; write failures propagate. The login
//! flow is the sole interactive writer, so no cross-process locking is done.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::AuthError;
use crate::types::OAuthCredential;

/// Default credential file name, relative to the working directory.
pub const AUTH_FILE_NAME: &str = ".auth_data.json";

/// Persistence interface for the single OAuth credential record.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch a credential. Read errors are treated as absence.
    async fn get(&self, key: &str) -> Option<OAuthCredential>;

    /// Persist a credential. Last writer wins.
    async fn set(&self, key: &str, credential: &OAuthCredential) -> Result<(), AuthError>;

    /// Delete a credential.
    async fn remove(&self, key: &str) -> Result<(), AuthError>;

    /// Fetch every stored credential.
    async fn get_all(&self) -> HashMap<String, OAuthCredential>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Local JSON file backend
// ─────────────────────────────────────────────────────────────────────────────

/// File-backed credential store.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store at `.auth_data.json` under the given directory.
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(AUTH_FILE_NAME),
        }
    }

    /// Store at `.auth_data.json` in the current working directory.
    pub fn in_cwd() -> std::io::Result<Self> {
        Ok(Self::new(&std::env::current_dir()?))
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full map. Missing or malformed files read as empty.
    async fn read_map(&self) -> HashMap<String, OAuthCredential> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                tracing::warn!("failed to read credential file: {e}");
                return HashMap::new();
            }
        };

        match serde_json::from_str(&data) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!("failed to parse credential file: {e}");
                HashMap::new()
            }
        }
    }

    /// Serialize the full map back out (read-modify-write).
    async fn write_map(&self, map: &HashMap<String, OAuthCredential>) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(map)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, key: &str) -> Option<OAuthCredential> {
        self.read_map().await.remove(key)
    }

    async fn set(&self, key: &str, credential: &OAuthCredential) -> Result<(), AuthError> {
        let mut map = self.read_map().await;
        let _ = map.insert(key.to_string(), credential.clone());
        self.write_map(&map).await
    }

    async fn remove(&self, key: &str) -> Result<(), AuthError> {
        let mut map = self.read_map().await;
        if map.remove(key).is_some() {
            self.write_map(&map).await?;
        }
        Ok(())
    }

    async fn get_all(&self) -> HashMap<String, OAuthCredential> {
        self.read_map().await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Remote REST key-value backend
// ─────────────────────────────────────────────────────────────────────────────

/// REST envelope: `{"result": <value-or-null>}`.
#[derive(Deserialize)]
struct RestEnvelope {
    result: Option<String>,
}

/// Remote key-value credential store.
pub struct RestCredentialStore {
    base_url: String,
    token: String,
    http: reqwest::Client,
    /// Namespace prefix so credential keys don't collide with cache keys.
    prefix: String,
}

impl RestCredentialStore {
    /// Create a store against a REST KV service.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            token: token.into(),
            http: reqwest::Client::new(),
            prefix: "auth:".to_string(),
        }
    }

    fn key_url(&self, op: &str, key: &str) -> String {
        format!("{}/{op}/{}{key}", self.base_url, self.prefix)
    }
}

#[async_trait]
impl CredentialStore for RestCredentialStore {
    async fn get(&self, key: &str) -> Option<OAuthCredential> {
        let resp = self
            .http
            .get(self.key_url("get", key))
            .bearer_auth(&self.token)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            tracing::warn!(status = %resp.status(), "credential read failed");
            return None;
        }
        let envelope: RestEnvelope = resp.json().await.ok()?;
        serde_json::from_str(&envelope.result?).ok()
    }

    async fn set(&self, key: &str, credential: &OAuthCredential) -> Result<(), AuthError> {
        let body = serde_json::to_string(credential)?;
        let resp = self
            .http
            .post(self.key_url("set", key))
            .bearer_auth(&self.token)
            .body(body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AuthError::Store(format!("set returned {status}: {text}")));
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AuthError> {
        let resp = self
            .http
            .get(self.key_url("del", key))
            .bearer_auth(&self.token)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            return Err(AuthError::Store(format!("del returned {status}")));
        }
        Ok(())
    }

    async fn get_all(&self) -> HashMap<String, OAuthCredential> {
        // The remote tier holds exactly one record; fetch it directly.
        let mut map = HashMap::new();
        if let Some(cred) = self.get(crate::types::CREDENTIAL_KEY).await {
            let _ = map.insert(crate::types::CREDENTIAL_KEY.to_string(), cred);
        }
        map
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
