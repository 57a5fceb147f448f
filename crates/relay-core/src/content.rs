//! Thinking-block content type.
//!
//! A thinking block is a cryptographically signed reasoning artefact emitted
//! by the upstream model. The signature is opaque: the proxy stores and
//! replays it verbatim, never inspecting or re-ordering it.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A signed extended-thinking block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingBlock {
    /// Reasoning text.
    pub thinking: String,
    /// Opaque signature. Present once the enclosing stream has closed.
    pub signature: String,
}

impl ThinkingBlock {
    /// Create a new thinking block.
    #[must_use]
    pub fn new(thinking: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            thinking: thinking.into(),
            signature: signature.into(),
        }
    }

    /// Render as an upstream `thinking` content block.
    #[must_use]
    pub fn to_content_block(&self) -> Value {
        json!({
            "type": "thinking",
            "thinking": self.thinking,
            "signature": self.signature,
        })
    }
}

/// Whether a JSON content block is a thinking variant (`thinking` or
/// `redacted_thinking`).
#[must_use]
pub fn is_thinking_block(block: &Value) -> bool {
    matches!(
        block.get("type").and_then(Value::as_str),
        Some("thinking" | "redacted_thinking")
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
