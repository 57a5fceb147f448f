//! Read-through cache façade and history injection.

use std::sync::Arc;

use serde_json::{Value, json};

use relay_core::content::is_thinking_block;
use relay_core::{ThinkingBlock, now_ms};

use crate::key::content_key;
use crate::local::LocalTier;
use crate::remote::{PersistentTier, ThinkingCacheEntry};

/// Outcome of re-attaching cached thinking blocks to a message history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InjectionReport {
    /// Assistant messages that received a cached thinking block.
    pub injected: usize,
    /// Assistant messages left without one.
    pub missing: usize,
    /// True iff every assistant message now carries a thinking block.
    pub can_use_thinking: bool,
}

/// Two-tier thinking-block cache.
pub struct ThinkingCache {
    local: LocalTier,
    remote: Option<Arc<dyn PersistentTier>>,
    ttl_secs: u64,
}

impl ThinkingCache {
    /// Create a cache. `remote` is optional: without it the cache is
    /// local-only (degraded but functional).
    #[must_use]
    pub fn new(local_cap: usize, remote: Option<Arc<dyn PersistentTier>>, ttl_secs: u64) -> Self {
        Self {
            local: LocalTier::new(local_cap),
            remote,
            ttl_secs,
        }
    }

    /// Whether a persistent tier is configured.
    #[must_use]
    pub fn has_persistent_tier(&self) -> bool {
        self.remote.is_some()
    }

    /// Look up a thinking block by key: local first, remote backfills local.
    pub async fn lookup(&self, key: &str) -> Option<ThinkingBlock> {
        if let Some(entry) = self.local.get(key) {
            return Some(entry.thinking_block);
        }

        let remote = self.remote.as_ref()?;
        let entry = remote.get(key).await?;
        self.local.insert(key.to_string(), entry.clone());
        Some(entry.thinking_block)
    }

    /// Cache a thinking block under its message content.
    ///
    /// Empty content has no key and is not cached. The persistent write is
    /// best-effort: failures are logged and swallowed, so this is safe to run
    /// from a fire-and-forget task.
    pub async fn store(&self, content: &Value, block: ThinkingBlock) {
        let Some(key) = content_key(content) else {
            tracing::debug!("empty assistant content, skipping thinking cache write");
            return;
        };

        let entry = ThinkingCacheEntry {
            thinking_block: block,
            timestamp: now_ms(),
        };
        self.local.insert(key.clone(), entry.clone());

        if let Some(remote) = &self.remote {
            if let Err(e) = remote.setex(&key, self.ttl_secs, &entry).await {
                tracing::warn!(key = %key, "persistent thinking cache write failed: {e}");
            }
        }
    }

    /// Re-attach cached thinking blocks to a message history.
    ///
    /// For each assistant message without a thinking block, look up its
    /// content key and prepend the cached block on a hit. This is the only
    /// path that adds thinking blocks to historical messages.
    pub async fn inject(&self, messages: &mut [Value]) -> InjectionReport {
        let mut report = InjectionReport::default();

        for message in messages.iter_mut() {
            if message.get("role").and_then(Value::as_str) != Some("assistant") {
                continue;
            }
            let Some(content) = message.get("content") else {
                report.missing += 1;
                continue;
            };
            if has_thinking_block(content) {
                continue;
            }

            let Some(key) = content_key(content) else {
                report.missing += 1;
                continue;
            };
            match self.lookup(&key).await {
                Some(block) => {
                    message["content"] = prepend_thinking(content, &block);
                    report.injected += 1;
                }
                None => report.missing += 1,
            }
        }

        report.can_use_thinking = report.missing == 0;
        report
    }
}

/// Whether content already carries a thinking block.
fn has_thinking_block(content: &Value) -> bool {
    content
        .as_array()
        .is_some_and(|blocks| blocks.iter().any(is_thinking_block))
}

/// Content with the thinking block as the first element. String content is
/// promoted to a block array.
fn prepend_thinking(content: &Value, block: &ThinkingBlock) -> Value {
    let mut blocks = vec![block.to_content_block()];
    match content {
        Value::String(s) => blocks.push(json!({"type": "text", "text": s})),
        Value::Array(existing) => blocks.extend(existing.iter().cloned()),
        _ => {}
    }
    Value::Array(blocks)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// In-memory persistent tier for exercising the read-through path.
    #[derive(Default)]
    struct FakeTier {
        entries: Mutex<HashMap<String, ThinkingCacheEntry>>,
        fail_writes: bool,
    }

    #[async_trait]
    impl PersistentTier for FakeTier {
        async fn get(&self, key: &str) -> Option<ThinkingCacheEntry> {
            self.entries.lock().get(key).cloned()
        }

        async fn setex(
            &self,
            key: &str,
            _ttl_secs: u64,
            entry: &ThinkingCacheEntry,
        ) -> Result<(), crate::CacheError> {
            if self.fail_writes {
                return Err(crate::CacheError::Store("down".into()));
            }
            let _ = self.entries.lock().insert(key.to_string(), entry.clone());
            Ok(())
        }
    }

    fn block() -> ThinkingBlock {
        ThinkingBlock::new("step by step", "sig==")
    }

    fn assistant(content: Value) -> Value {
        json!({"role": "assistant", "content": content})
    }

    // ── store / lookup ───────────────────────────────────────────────────

    #[tokio::test]
    async fn store_then_lookup_local_only() {
        let cache = ThinkingCache::new(10, None, 60);
        let content = json!([{"type": "text", "text": "Hello"}]);
        cache.store(&content, block()).await;

        let key = content_key(&content).unwrap();
        assert_eq!(cache.lookup(&key).await.unwrap(), block());
    }

    #[tokio::test]
    async fn empty_content_not_stored() {
        let cache = ThinkingCache::new(10, None, 60);
        cache.store(&json!([]), block()).await;
        cache.store(&json!(""), block()).await;
        // Nothing to look up; also nothing panicked.
        assert!(cache.lookup("v2:0:0").await.is_none());
    }

    #[tokio::test]
    async fn remote_hit_backfills_local() {
        let tier = Arc::new(FakeTier::default());
        let entry = ThinkingCacheEntry {
            thinking_block: block(),
            timestamp: 42,
        };
        let _ = tier.entries.lock().insert("k1".into(), entry);

        let cache = ThinkingCache::new(10, Some(tier.clone()), 60);
        assert_eq!(cache.lookup("k1").await.unwrap(), block());

        // Second read must be served locally even if the remote forgets.
        tier.entries.lock().clear();
        assert_eq!(cache.lookup("k1").await.unwrap(), block());
    }

    #[tokio::test]
    async fn store_writes_both_tiers() {
        let tier = Arc::new(FakeTier::default());
        let cache = ThinkingCache::new(10, Some(tier.clone()), 60);
        let content = json!("persist me");
        cache.store(&content, block()).await;

        let key = content_key(&content).unwrap();
        assert!(tier.entries.lock().contains_key(&key));
    }

    #[tokio::test]
    async fn remote_write_failure_is_swallowed() {
        let tier = Arc::new(FakeTier {
            fail_writes: true,
            ..FakeTier::default()
        });
        let cache = ThinkingCache::new(10, Some(tier), 60);
        let content = json!("still cached locally");
        cache.store(&content, block()).await;

        let key = content_key(&content).unwrap();
        assert!(cache.lookup(&key).await.is_some());
    }

    // ── inject ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn inject_prepends_cached_block() {
        let cache = ThinkingCache::new(10, None, 60);
        let content = json!([{"type": "text", "text": "Answer"}]);
        cache.store(&content, block()).await;

        let mut messages = vec![
            json!({"role": "user", "content": "Question"}),
            assistant(content),
        ];
        let report = cache.inject(&mut messages).await;

        assert_eq!(report.injected, 1);
        assert_eq!(report.missing, 0);
        assert!(report.can_use_thinking);

        let blocks = messages[1]["content"].as_array().unwrap();
        assert_eq!(blocks[0]["type"], "thinking");
        assert_eq!(blocks[1]["type"], "text");
    }

    #[tokio::test]
    async fn inject_promotes_string_content() {
        let cache = ThinkingCache::new(10, None, 60);
        cache.store(&json!("Plain answer"), block()).await;

        let mut messages = vec![assistant(json!("Plain answer"))];
        let report = cache.inject(&mut messages).await;
        assert_eq!(report.injected, 1);

        let blocks = messages[0]["content"].as_array().unwrap();
        assert_eq!(blocks[0]["type"], "thinking");
        assert_eq!(blocks[1], json!({"type": "text", "text": "Plain answer"}));
    }

    #[tokio::test]
    async fn inject_counts_misses() {
        let cache = ThinkingCache::new(10, None, 60);
        let known = json!([{"type": "text", "text": "first turn"}]);
        cache.store(&known, block()).await;

        let mut messages = vec![
            assistant(known),
            assistant(json!([{"type": "text", "text": "second turn"}])),
        ];
        let report = cache.inject(&mut messages).await;

        assert_eq!(report.injected, 1);
        assert_eq!(report.missing, 1);
        assert!(!report.can_use_thinking);
    }

    #[tokio::test]
    async fn inject_skips_messages_with_thinking() {
        let cache = ThinkingCache::new(10, None, 60);
        let mut messages = vec![assistant(json!([
            {"type": "thinking", "thinking": "already here", "signature": "s"},
            {"type": "text", "text": "kept"},
        ]))];
        let report = cache.inject(&mut messages).await;

        assert_eq!(report.injected, 0);
        assert_eq!(report.missing, 0);
        assert!(report.can_use_thinking);
        // Untouched.
        assert_eq!(messages[0]["content"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn inject_ignores_user_messages() {
        let cache = ThinkingCache::new(10, None, 60);
        let mut messages = vec![json!({"role": "user", "content": "hi"})];
        let report = cache.inject(&mut messages).await;
        assert_eq!(report.injected, 0);
        assert_eq!(report.missing, 0);
        assert!(report.can_use_thinking);
    }

    #[tokio::test]
    async fn key_stable_under_strip_and_prepend() {
        // key(content) == key(strip_thinking(prepend_thinking(content)))
        let content = json!([{"type": "text", "text": "law"}]);
        let prepended = prepend_thinking(&content, &block());
        let stripped: Vec<Value> = prepended
            .as_array()
            .unwrap()
            .iter()
            .filter(|b| !is_thinking_block(b))
            .cloned()
            .collect();
        assert_eq!(content_key(&content), content_key(&Value::Array(stripped)));
    }

    #[tokio::test]
    async fn reinject_after_capture_round_trip() {
        // A clean stream capture followed by a history replay finds the block.
        let cache = ThinkingCache::new(10, None, 60);
        let canonical = json!([{"type": "text", "text": "final answer"}]);
        cache.store(&canonical, block()).await;

        // Client replays the same assistant content, thinking stripped.
        let mut messages = vec![assistant(json!("final answer"))];
        let report = cache.inject(&mut messages).await;
        assert!(report.injected >= 1);
    }
}
