//! OpenAI chat-completion wire types.
//!
//! Only the fields this proxy emits. Everything optional is skipped when
//! absent so chunk payloads stay minimal, matching what IDE clients expect
//! from the reference implementation.

use serde::{Deserialize, Serialize};

/// `object` value for streaming chunks.
pub const CHUNK_OBJECT: &str = "chat.completion.chunk";

/// `object` value for full completions.
pub const COMPLETION_OBJECT: &str = "chat.completion";

/// One streaming chunk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Stable per-stream id (`chatcmpl-…`).
    pub id: String,
    /// Always [`CHUNK_OBJECT`].
    pub object: String,
    /// Unix seconds, fixed for the whole stream.
    pub created: i64,
    /// The client's original model string, echoed verbatim.
    pub model: String,
    /// Exactly one choice.
    pub choices: Vec<ChunkChoice>,
    /// Usage totals; only on the final usage chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// A choice inside a chunk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Always 0 — one choice per stream.
    pub index: u32,
    /// Incremental payload.
    pub delta: Delta,
    /// Mapped stop reason, on the finishing chunk only.
    pub finish_reason: Option<String>,
}

/// Incremental message payload.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Delta {
    /// `"assistant"` on the opening chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Text fragment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool-call fragments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// A tool-call fragment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Tool-call slot, assigned in order of appearance.
    pub index: usize,
    /// Tool-call id, on the opening fragment only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// `"function"`, on the opening fragment only.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub call_type: Option<String>,
    /// Function name/arguments fragment.
    pub function: FunctionDelta,
}

/// Function fragment inside a tool call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionDelta {
    /// Function name, on the opening fragment only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Argument string fragment.
    pub arguments: String,
}

/// Usage totals.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Usage {
    /// Input tokens.
    pub prompt_tokens: u64,
    /// Output tokens.
    pub completion_tokens: u64,
    /// Sum of the two.
    pub total_tokens: u64,
    /// Prompt breakdown.
    pub prompt_tokens_details: PromptTokensDetails,
    /// Completion breakdown (placeholder for wire compatibility).
    pub completion_tokens_details: CompletionTokensDetails,
}

/// Prompt-side token breakdown.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PromptTokensDetails {
    /// Tokens served from the upstream prompt cache.
    pub cached_tokens: u64,
}

/// Completion-side token breakdown.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionTokensDetails {
    /// Always 0 — reasoning tokens are not separately metered here.
    pub reasoning_tokens: u64,
}

impl Usage {
    /// Build usage from upstream counters.
    #[must_use]
    pub fn from_counts(prompt: u64, completion: u64, cached: u64) -> Self {
        Self {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
            prompt_tokens_details: PromptTokensDetails {
                cached_tokens: cached,
            },
            completion_tokens_details: CompletionTokensDetails {
                reasoning_tokens: 0,
            },
        }
    }
}

/// A full (non-streaming) chat completion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Stable id (`chatcmpl-…`).
    pub id: String,
    /// Always [`COMPLETION_OBJECT`].
    pub object: String,
    /// Unix seconds.
    pub created: i64,
    /// The client's original model string, echoed verbatim.
    pub model: String,
    /// Exactly one choice.
    pub choices: Vec<CompletionChoice>,
    /// Usage totals.
    pub usage: Usage,
}

/// A choice inside a full completion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionChoice {
    /// Always 0.
    pub index: u32,
    /// The assistant message.
    pub message: CompletionMessage,
    /// Mapped stop reason.
    pub finish_reason: Option<String>,
}

/// The assistant message of a full completion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionMessage {
    /// Always `"assistant"`.
    pub role: String,
    /// Concatenated text; omitted entirely when empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls, if the message invoked tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// A complete tool call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool-call id.
    pub id: String,
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub call_type: String,
    /// Invoked function.
    pub function: FunctionCall,
}

/// Function name and serialized arguments.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name.
    pub name: String,
    /// Arguments as a JSON string.
    pub arguments: String,
}

/// Map an upstream stop reason to the OpenAI vocabulary.
///
/// `end_turn` → `stop`, `tool_use` → `tool_calls`; anything else passes
/// through unchanged.
#[must_use]
pub fn map_finish_reason(stop_reason: &str) -> String {
    match stop_reason {
        "end_turn" => "stop".to_string(),
        "tool_use" => "tool_calls".to_string(),
        other => other.to_string(),
    }
}

/// Derive the stable chunk id from the upstream message id: the `msg_`
/// prefix is replaced with `chatcmpl-`.
#[must_use]
pub fn chunk_id_from(message_id: &str) -> String {
    format!("chatcmpl-{}", message_id.strip_prefix("msg_").unwrap_or(message_id))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
