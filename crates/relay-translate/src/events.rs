//! Upstream Messages API SSE event structures.
//!
//! These mirror the raw JSON envelopes on the upstream event stream. The
//! stream is a loosely tagged union: every enum here carries a catch-all
//! variant so unknown event or block kinds are ignored rather than failing
//! the stream when the upstream grows new types.

use serde::Deserialize;
use serde_json::Value;

/// Top-level upstream SSE event, tagged by `type`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type")]
pub enum UpstreamEvent {
    /// `message_start` — first event; carries message id, model, and usage.
    #[serde(rename = "message_start")]
    MessageStart {
        /// The message envelope.
        message: EventMessage,
    },

    /// `content_block_start` — a new content block begins at `index`.
    #[serde(rename = "content_block_start")]
    ContentBlockStart {
        /// Block index.
        index: usize,
        /// The opening block.
        content_block: EventContentBlock,
    },

    /// `content_block_delta` — incremental content for the block at `index`.
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta {
        /// Block index.
        index: usize,
        /// The delta payload.
        delta: EventDelta,
    },

    /// `content_block_stop` — the block at `index` is complete.
    #[serde(rename = "content_block_stop")]
    ContentBlockStop {
        /// Block index.
        index: usize,
    },

    /// `message_delta` — message-level updates (stop reason, usage totals).
    #[serde(rename = "message_delta")]
    MessageDelta {
        /// Delta fields.
        delta: EventMessageDelta,
        /// Usage update.
        #[serde(default)]
        usage: Option<EventUsage>,
    },

    /// `message_stop` — stream complete.
    #[serde(rename = "message_stop")]
    MessageStop,

    /// `ping` — keepalive.
    #[serde(rename = "ping")]
    Ping,

    /// `error` — in-stream API error.
    #[serde(rename = "error")]
    Error {
        /// Error details.
        error: EventError,
    },

    /// Any event kind this proxy does not know about.
    #[serde(other)]
    Unknown,
}

/// Message envelope in `message_start`.
#[derive(Clone, Debug, Deserialize)]
pub struct EventMessage {
    /// Upstream message id (`msg_…`).
    pub id: Option<String>,
    /// Upstream model that is answering.
    pub model: Option<String>,
    /// Usage so far.
    #[serde(default)]
    pub usage: EventUsage,
}

/// Token usage fields; all optional on the wire.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EventUsage {
    /// Input tokens.
    #[serde(default)]
    pub input_tokens: u64,
    /// Output tokens.
    #[serde(default)]
    pub output_tokens: u64,
    /// Cache-creation input tokens.
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    /// Cache-read input tokens.
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

/// Content block in `content_block_start`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type")]
pub enum EventContentBlock {
    /// Text block; `text` is usually empty at start.
    #[serde(rename = "text")]
    Text {
        /// Initial text.
        #[serde(default)]
        text: String,
    },

    /// Extended-thinking block.
    #[serde(rename = "thinking")]
    Thinking {
        /// Initial thinking text.
        #[serde(default)]
        thinking: String,
        /// Inline signature, if the upstream sends one up front.
        #[serde(default)]
        signature: Option<String>,
    },

    /// Redacted thinking block (opaque data, no signature deltas follow).
    #[serde(rename = "redacted_thinking")]
    RedactedThinking {
        /// Opaque payload.
        #[serde(default)]
        data: String,
    },

    /// Tool invocation block.
    #[serde(rename = "tool_use")]
    ToolUse {
        /// Tool call id.
        id: String,
        /// Tool name.
        name: String,
        /// Inline input, if any (arguments normally stream as JSON deltas).
        #[serde(default)]
        input: Value,
    },

    /// Any block kind this proxy does not know about.
    #[serde(other)]
    Unknown,
}

/// Delta payload in `content_block_delta`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type")]
pub enum EventDelta {
    /// Text fragment.
    #[serde(rename = "text_delta")]
    TextDelta {
        /// Fragment.
        text: String,
    },

    /// Thinking-text fragment.
    #[serde(rename = "thinking_delta")]
    ThinkingDelta {
        /// Fragment.
        thinking: String,
    },

    /// Signature fragment for the enclosing thinking block.
    #[serde(rename = "signature_delta")]
    SignatureDelta {
        /// Fragment.
        signature: String,
    },

    /// Tool-input JSON fragment. May be cumulative or a pure delta.
    #[serde(rename = "input_json_delta")]
    InputJsonDelta {
        /// The JSON fragment.
        partial_json: String,
    },

    /// Any delta kind this proxy does not know about.
    #[serde(other)]
    Unknown,
}

/// Message-level delta in `message_delta`.
#[derive(Clone, Debug, Deserialize)]
pub struct EventMessageDelta {
    /// New stop reason, if the message just finished.
    pub stop_reason: Option<String>,
}

/// In-stream error payload.
#[derive(Clone, Debug, Deserialize)]
pub struct EventError {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message.
    pub message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
