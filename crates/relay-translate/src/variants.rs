//! Client alias → upstream model resolution.
//!
//! IDE clients present their own model names (`claude-4.5-sonnet-thinking`,
//! `claude-4-sonnet-high`, …). The resolver maps each alias to an upstream
//! model id, a max-token budget, and a thinking configuration, while keeping
//! the unmodified client string for echo in responses.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Upstream ids the alias table and heuristics resolve to.
const OPUS_MODEL: &str = "claude-opus-4-5-20251101";
const SONNET_MODEL: &str = "claude-sonnet-4-5-20250929";
const HAIKU_MODEL: &str = "claude-haiku-4-5-20251001";
const SONNET_4_MODEL: &str = "claude-sonnet-4-20250514";
const OPUS_4_MODEL: &str = "claude-opus-4-20250514";
const SONNET_37_MODEL: &str = "claude-3-7-sonnet-20250219";

/// Default reasoning budget for thinking variants.
pub const DEFAULT_THINKING_BUDGET: u32 = 16_000;

/// Max tokens for thinking-capable resolutions.
const THINKING_MAX_TOKENS: u32 = 64_000;

/// Max tokens for passthrough resolutions.
const PASSTHROUGH_MAX_TOKENS: u32 = 8_192;

/// Thinking configuration for a resolved variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThinkingConfig {
    /// Reasoning token budget.
    pub budget_tokens: u32,
}

/// A resolved model variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelVariant {
    /// Upstream model id to call.
    pub upstream_model: String,
    /// Max output tokens for this variant.
    pub max_tokens: u32,
    /// Thinking configuration, when enabled.
    pub thinking: Option<ThinkingConfig>,
    /// The unmodified client model string, echoed in all responses.
    pub original_model: String,
}

impl ModelVariant {
    /// Whether thinking is enabled for this variant.
    #[must_use]
    pub fn thinking_enabled(&self) -> bool {
        self.thinking.is_some()
    }
}

/// Alias table entry: `(upstream model, max tokens, thinking budget)`.
type VariantEntry = (&'static str, u32, Option<u32>);

/// Client-facing alias table.
static VARIANTS: LazyLock<HashMap<&'static str, VariantEntry>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    let _ = m.insert("claude-4.5-sonnet", (SONNET_MODEL, 64_000, None));
    let _ = m.insert(
        "claude-4.5-sonnet-thinking",
        (SONNET_MODEL, 64_000, Some(DEFAULT_THINKING_BUDGET)),
    );
    let _ = m.insert("claude-4.5-opus", (OPUS_MODEL, 64_000, None));
    let _ = m.insert(
        "claude-4.5-opus-thinking",
        (OPUS_MODEL, 64_000, Some(DEFAULT_THINKING_BUDGET)),
    );
    let _ = m.insert("claude-4.5-haiku", (HAIKU_MODEL, 64_000, None));

    let _ = m.insert("claude-4-sonnet", (SONNET_4_MODEL, 64_000, None));
    let _ = m.insert(
        "claude-4-sonnet-thinking",
        (SONNET_4_MODEL, 64_000, Some(DEFAULT_THINKING_BUDGET)),
    );
    let _ = m.insert("claude-4-opus", (OPUS_4_MODEL, 32_000, None));
    let _ = m.insert(
        "claude-4-opus-thinking",
        (OPUS_4_MODEL, 32_000, Some(DEFAULT_THINKING_BUDGET)),
    );

    let _ = m.insert("claude-3.7-sonnet", (SONNET_37_MODEL, 64_000, None));
    let _ = m.insert(
        "claude-3.7-sonnet-thinking",
        (SONNET_37_MODEL, 64_000, Some(DEFAULT_THINKING_BUDGET)),
    );

    m
});

/// All aliases in the table (for the model catalogue).
#[must_use]
pub fn all_aliases() -> Vec<&'static str> {
    let mut aliases: Vec<&'static str> = VARIANTS.keys().copied().collect();
    aliases.sort_unstable();
    aliases
}

/// Resolve a client model string to a variant.
///
/// Resolution order: exact (case-insensitive) alias match; the `thinking`
/// substring heuristic; passthrough with conservative defaults.
#[must_use]
pub fn resolve_variant(model: &str) -> ModelVariant {
    let normalised = model.trim().to_lowercase();

    if let Some((upstream, max_tokens, budget)) = VARIANTS.get(normalised.as_str()) {
        return ModelVariant {
            upstream_model: (*upstream).to_string(),
            max_tokens: *max_tokens,
            thinking: budget.map(|budget_tokens| ThinkingConfig { budget_tokens }),
            original_model: model.to_string(),
        };
    }

    if normalised.contains("thinking") {
        let upstream = if normalised.contains("opus") {
            OPUS_MODEL
        } else if normalised.contains("haiku") {
            HAIKU_MODEL
        } else {
            SONNET_MODEL
        };
        return ModelVariant {
            upstream_model: upstream.to_string(),
            max_tokens: THINKING_MAX_TOKENS,
            thinking: Some(ThinkingConfig {
                budget_tokens: DEFAULT_THINKING_BUDGET,
            }),
            original_model: model.to_string(),
        };
    }

    // Unrecognised names pass through untouched; upstream ids already look
    // like `claude-…` and anything else is rejected by the gateway rule
    // before dispatch.
    ModelVariant {
        upstream_model: normalised,
        max_tokens: PASSTHROUGH_MAX_TOKENS,
        thinking: None,
        original_model: model.to_string(),
    }
}

/// Whether a model name is Claude-family.
///
/// Substring matching is deliberate: an exotic name containing `sonnet` is
/// accepted and passed through.
#[must_use]
pub fn is_claude_family(model: &str) -> bool {
    let normalised = model.trim().to_lowercase();
    ["claude", "sonnet", "opus", "haiku"]
        .iter()
        .any(|family| normalised.contains(family))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
