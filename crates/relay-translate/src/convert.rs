//! Stateless converter for non-streaming upstream responses.
//!
//! Takes a complete Messages API response body and produces a single OpenAI
//! chat completion: text blocks concatenate into `message.content`, tool_use
//! blocks become `tool_calls`, the stop reason and usage map the same way the
//! streaming path maps them.

use serde_json::Value;

use crate::errors::TranslateError;
use crate::openai::{
    COMPLETION_OBJECT, ChatCompletion, CompletionChoice, CompletionMessage, FunctionCall,
    ToolCall, Usage, chunk_id_from, map_finish_reason,
};

/// Convert a full upstream response to an OpenAI chat completion.
///
/// `original_model` is the client's model string, echoed verbatim.
pub fn to_chat_completion(
    upstream: &Value,
    original_model: &str,
) -> Result<ChatCompletion, TranslateError> {
    let content = upstream
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| TranslateError::MalformedResponse("missing content array".to_string()))?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in content {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(t) = block.get("text").and_then(Value::as_str) {
                    text.push_str(t);
                }
            }
            Some("tool_use") => {
                let input = block.get("input").cloned().unwrap_or(Value::Null);
                let arguments = if input.is_null() {
                    "{}".to_string()
                } else {
                    serde_json::to_string(&input)
                        .map_err(|e| TranslateError::MalformedResponse(e.to_string()))?
                };
                tool_calls.push(ToolCall {
                    id: block
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    call_type: "function".to_string(),
                    function: FunctionCall {
                        name: block
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        arguments,
                    },
                });
            }
            // Thinking and anything newer stay upstream-only.
            _ => {}
        }
    }

    let usage = upstream.get("usage").cloned().unwrap_or_default();
    let prompt = usage
        .get("input_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let completion = usage
        .get("output_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let cached = usage
        .get("cache_read_input_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    Ok(ChatCompletion {
        id: chunk_id_from(
            upstream
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("unknown"),
        ),
        object: COMPLETION_OBJECT.to_string(),
        created: chrono::Utc::now().timestamp(),
        model: original_model.to_string(),
        choices: vec![CompletionChoice {
            index: 0,
            message: CompletionMessage {
                role: "assistant".to_string(),
                content: if text.is_empty() { None } else { Some(text) },
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls)
                },
            },
            finish_reason: upstream
                .get("stop_reason")
                .and_then(Value::as_str)
                .map(map_finish_reason),
        }],
        usage: Usage::from_counts(prompt, completion, cached),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
