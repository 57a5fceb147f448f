//! Environment-driven configuration.
//!
//! All knobs come from the environment (see the deployment docs): `PORT`,
//! `HOST`, `API_KEY`, `ANTHROPIC_OAUTH_CLIENT_ID`, `UPSTASH_REDIS_REST_URL`,
//! `UPSTASH_REDIS_REST_TOKEN`, `THINKING_CACHE_TTL_DAYS`, `DEBUG`. Missing
//! persistent storage degrades silently to the local credential file and a
//! memory-only thinking cache.

use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 9095;

/// Default persistent-cache TTL in days.
pub const DEFAULT_TTL_DAYS: u64 = 10;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Listen port (`PORT`).
    pub port: u16,
    /// Listen host (`HOST`).
    pub host: String,
    /// Optional inbound bearer gate (`API_KEY`).
    pub api_key: Option<String>,
    /// OAuth client id override (`ANTHROPIC_OAUTH_CLIENT_ID`).
    pub anthropic_oauth_client_id: Option<String>,
    /// Persistent KV endpoint (`UPSTASH_REDIS_REST_URL`).
    pub upstash_redis_rest_url: Option<String>,
    /// Persistent KV token (`UPSTASH_REDIS_REST_TOKEN`).
    pub upstash_redis_rest_token: Option<String>,
    /// Thinking-cache TTL in days (`THINKING_CACHE_TTL_DAYS`).
    pub thinking_cache_ttl_days: u64,
    /// Verbose logging switch (`DEBUG`).
    pub debug: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: "0.0.0.0".into(),
            api_key: None,
            anthropic_oauth_client_id: None,
            upstash_redis_rest_url: None,
            upstash_redis_rest_token: None,
            thinking_cache_ttl_days: DEFAULT_TTL_DAYS,
            debug: None,
        }
    }
}

impl Config {
    /// Load from the environment over defaults.
    pub fn from_env() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::raw().only(&[
                "PORT",
                "HOST",
                "API_KEY",
                "ANTHROPIC_OAUTH_CLIENT_ID",
                "UPSTASH_REDIS_REST_URL",
                "UPSTASH_REDIS_REST_TOKEN",
                "THINKING_CACHE_TTL_DAYS",
                "DEBUG",
            ]))
            .extract()
    }

    /// Whether debug logging was requested.
    #[must_use]
    pub fn debug_enabled(&self) -> bool {
        matches!(
            self.debug.as_deref().map(str::to_ascii_lowercase).as_deref(),
            Some("1" | "true" | "yes")
        )
    }

    /// Persistent KV configuration, if usable.
    ///
    /// Placeholder values (the ones shipped in env templates) count as
    /// unconfigured.
    #[must_use]
    pub fn persistent_kv(&self) -> Option<(&str, &str)> {
        let url = self.upstash_redis_rest_url.as_deref()?;
        let token = self.upstash_redis_rest_token.as_deref()?;
        if is_placeholder(url) || is_placeholder(token) {
            return None;
        }
        Some((url, token))
    }

    /// Cache TTL in seconds.
    #[must_use]
    pub fn cache_ttl_secs(&self) -> u64 {
        self.thinking_cache_ttl_days * 86_400
    }

    /// Inbound API key, if a non-empty one is configured.
    #[must_use]
    pub fn inbound_api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

/// Unfilled template values.
fn is_placeholder(value: &str) -> bool {
    let lowered = value.to_ascii_lowercase();
    value.is_empty()
        || lowered.contains("your_")
        || lowered.contains("your-")
        || lowered.contains("placeholder")
        || lowered.contains("example.")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
