//! Persistent cache tier.
//!
//! The persistent tier is a remote REST key-value service with per-entry TTL
//! (Upstash convention: `GET /get/<key>`, `POST /setex/<key>/<seconds>`,
//! responses wrapped in `{"result": ...}`). All failures here are degraded
//! mode, never request failures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use relay_core::ThinkingBlock;

use crate::errors::CacheError;

/// A cached thinking block and its write time (epoch millis).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingCacheEntry {
    /// The signed thinking block, replayed verbatim.
    pub thinking_block: ThinkingBlock,
    /// Write time in milliseconds since the epoch.
    pub timestamp: i64,
}

/// Persistent `get`/`setex` interface.
#[async_trait]
pub trait PersistentTier: Send + Sync {
    /// Look up an entry. Errors read as misses.
    async fn get(&self, key: &str) -> Option<ThinkingCacheEntry>;

    /// Write an entry with a TTL in seconds.
    async fn setex(
        &self,
        key: &str,
        ttl_secs: u64,
        entry: &ThinkingCacheEntry,
    ) -> Result<(), CacheError>;
}

/// REST envelope: `{"result": <value-or-null>}`.
#[derive(Deserialize)]
struct RestEnvelope {
    result: Option<String>,
}

/// Upstash-style REST backend.
pub struct UpstashTier {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl UpstashTier {
    /// Create a tier against a REST KV service.
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
        }
    }
}

#[async_trait]
impl PersistentTier for UpstashTier {
    async fn get(&self, key: &str) -> Option<ThinkingCacheEntry> {
        let url = format!("{}/get/{key}", self.base_url);
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            tracing::debug!(status = %resp.status(), "persistent cache read failed");
            return None;
        }
        let envelope: RestEnvelope = resp.json().await.ok()?;
        serde_json::from_str(&envelope.result?).ok()
    }

    async fn setex(
        &self,
        key: &str,
        ttl_secs: u64,
        entry: &ThinkingCacheEntry,
    ) -> Result<(), CacheError> {
        let url = format!("{}/setex/{key}/{ttl_secs}", self.base_url);
        let body = serde_json::to_string(entry)?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .body(body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(CacheError::Store(format!("setex returned {status}: {text}")));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
