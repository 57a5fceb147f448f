//! `/v1/models` catalogue.
//!
//! The list is the upstream catalogue unioned with the static client-facing
//! aliases, sorted by `created` descending, cached for a short TTL. The
//! upstream fetch has a hard 2-second timeout; on any failure the static
//! list alone is served.

use std::time::{Duration, Instant};

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use serde_json::{Value, json};

use relay_translate::variants::all_aliases;

use crate::state::AppState;
use crate::upstream::ANTHROPIC_VERSION;

/// How long a fetched catalogue stays fresh.
const CATALOGUE_TTL: Duration = Duration::from_secs(300);

/// Hard timeout on the upstream fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(2);

/// Base `created` stamp for static aliases (2025-01-01).
const STATIC_CREATED_BASE: i64 = 1_735_689_600;

/// One catalogue entry, OpenAI-shaped.
#[derive(Clone, Debug, Serialize)]
pub struct ModelEntry {
    /// Model id as the client selects it.
    pub id: String,
    /// Always `"model"`.
    pub object: String,
    /// Unix seconds.
    pub created: i64,
    /// Always `"anthropic"`.
    pub owned_by: String,
}

impl ModelEntry {
    fn new(id: impl Into<String>, created: i64) -> Self {
        Self {
            id: id.into(),
            object: "model".to_string(),
            created,
            owned_by: "anthropic".to_string(),
        }
    }
}

/// A fetched catalogue and its fetch time.
#[derive(Clone, Debug)]
pub struct CatalogueCache {
    /// When the list was assembled.
    pub fetched_at: Instant,
    /// The assembled list.
    pub models: Vec<ModelEntry>,
}

/// GET `/v1/models`.
pub async fn model_list(State(state): State<AppState>) -> Json<Value> {
    if let Some(cache) = state.catalogue.lock().as_ref() {
        if cache.fetched_at.elapsed() < CATALOGUE_TTL {
            return Json(shape(&cache.models));
        }
    }

    let mut models = static_models();
    match fetch_upstream(&state).await {
        Ok(upstream) => merge(&mut models, upstream),
        Err(e) => tracing::debug!("model catalogue fetch failed, using static list: {e}"),
    }
    models.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| a.id.cmp(&b.id)));

    *state.catalogue.lock() = Some(CatalogueCache {
        fetched_at: Instant::now(),
        models: models.clone(),
    });
    Json(shape(&models))
}

/// The static client-facing alias list.
#[must_use]
pub fn static_models() -> Vec<ModelEntry> {
    all_aliases()
        .iter()
        .enumerate()
        .map(|(i, alias)| ModelEntry::new(*alias, STATIC_CREATED_BASE + i as i64))
        .collect()
}

/// Fetch the upstream catalogue. Requires a usable token; failures and
/// timeouts fall back to the static list.
async fn fetch_upstream(state: &AppState) -> Result<Vec<ModelEntry>, String> {
    let token = state
        .oauth
        .access_token()
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "no token for catalogue fetch".to_string())?;

    let resp = state
        .http
        .get(&state.models_url)
        .bearer_auth(token)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if !resp.status().is_success() {
        return Err(format!("catalogue fetch returned {}", resp.status()));
    }

    let body: Value = resp.json().await.map_err(|e| e.to_string())?;
    let Some(data) = body.get("data").and_then(Value::as_array) else {
        return Err("catalogue body missing data array".to_string());
    };

    Ok(data
        .iter()
        .filter_map(|entry| {
            let id = entry.get("id").and_then(Value::as_str)?;
            let created = entry
                .get("created_at")
                .and_then(Value::as_str)
                .and_then(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok())
                .map_or(STATIC_CREATED_BASE, |dt| dt.timestamp());
            Some(ModelEntry::new(id, created))
        })
        .collect())
}

/// Union by id; upstream entries win.
fn merge(models: &mut Vec<ModelEntry>, upstream: Vec<ModelEntry>) {
    for entry in upstream {
        if let Some(existing) = models.iter_mut().find(|m| m.id == entry.id) {
            *existing = entry;
        } else {
            models.push(entry);
        }
    }
}

fn shape(models: &[ModelEntry]) -> Value {
    json!({ "object": "list", "data": models })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
