//! Shared application state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use relay_auth::{
    CredentialStore, FileCredentialStore, OAuthManager, RestCredentialStore, default_config,
};
use relay_cache::{DEFAULT_LOCAL_CAP, PersistentTier, ThinkingCache, UpstashTier};

use crate::config::Config;
use crate::models::CatalogueCache;

/// A pending interactive login.
#[derive(Clone, Debug)]
pub struct LoginSession {
    /// PKCE verifier minted for this session.
    pub verifier: String,
    /// When the session was created (epoch millis).
    pub created_at: i64,
}

/// State shared across handlers. Cheap to clone — everything is `Arc`ed.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Credential manager (single source of truth is its store).
    pub oauth: Arc<OAuthManager>,
    /// Two-tier thinking cache.
    pub cache: Arc<ThinkingCache>,
    /// Shared HTTP client for upstream calls.
    pub http: reqwest::Client,
    /// Pending interactive logins, keyed by session id.
    pub sessions: Arc<Mutex<HashMap<String, LoginSession>>>,
    /// Cached model catalogue.
    pub catalogue: Arc<Mutex<Option<CatalogueCache>>>,
    /// Messages endpoint (overridable for tests).
    pub messages_url: String,
    /// Model catalogue endpoint (overridable for tests).
    pub models_url: String,
    /// Server start time.
    pub start_time: Instant,
}

impl AppState {
    /// Wire up state from configuration: select the credential backend and
    /// the cache tiers, build the OAuth manager.
    pub fn from_config(config: Config) -> std::io::Result<Self> {
        let store: Arc<dyn CredentialStore> = match config.persistent_kv() {
            Some((url, token)) => {
                tracing::info!("credential store: remote REST KV");
                Arc::new(RestCredentialStore::new(url, token))
            }
            None => {
                let store = FileCredentialStore::in_cwd()?;
                tracing::info!(path = %store.path().display(), "credential store: local file");
                Arc::new(store)
            }
        };

        let mut oauth_config = default_config();
        if let Some(client_id) = &config.anthropic_oauth_client_id {
            if !client_id.is_empty() {
                oauth_config = oauth_config.with_client_id(client_id.clone());
            }
        }

        let remote_tier: Option<Arc<dyn PersistentTier>> = config
            .persistent_kv()
            .map(|(url, token)| Arc::new(UpstashTier::new(url, token)) as Arc<dyn PersistentTier>);
        if remote_tier.is_none() {
            tracing::info!("thinking cache: local tier only");
        }

        let cache = ThinkingCache::new(DEFAULT_LOCAL_CAP, remote_tier, config.cache_ttl_secs());

        Ok(Self {
            oauth: Arc::new(OAuthManager::new(store, oauth_config)),
            cache: Arc::new(cache),
            http: reqwest::Client::new(),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            catalogue: Arc::new(Mutex::new(None)),
            messages_url: crate::upstream::MESSAGES_URL.to_string(),
            models_url: crate::upstream::MODELS_URL.to_string(),
            start_time: Instant::now(),
            config,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
