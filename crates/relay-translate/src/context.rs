//! Observability-only request summarisation.
//!
//! A pure function over the inbound body producing rough context stats for
//! logs: embedded file references, `@` mentions, a bytes/4 token estimate,
//! and message/tool counts. Nothing here ever alters the request, and the
//! token estimate is a heuristic — never use it for control decisions.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// Summary of an inbound request body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestSummary {
    /// Path-like tokens with a file extension.
    pub file_references: Vec<String>,
    /// `@name` mentions.
    pub mentions: Vec<String>,
    /// Crude token estimate: total text bytes / 4.
    pub estimated_tokens: usize,
    /// Number of tool definitions in the request.
    pub tool_count: usize,
    /// Number of conversation messages.
    pub message_count: usize,
}

/// Path-like token with an extension, e.g. `src/main.rs` or `notes.md`.
static FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9_@~./\\-]+\.[A-Za-z0-9]{1,8}\b").unwrap());

/// `@name` mention.
static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[A-Za-z0-9][A-Za-z0-9_.-]*").unwrap());

/// Bare version string, e.g. `1.2.3` or `v0.12`.
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v?\d+(\.\d+)+$").unwrap());

/// Summarise an inbound request body.
#[must_use]
pub fn summarize_request(body: &Value) -> RequestSummary {
    let text = collect_text(body);

    let mut file_references: Vec<String> = FILE_RE
        .find_iter(&text)
        .map(|m| m.as_str().to_string())
        .filter(|candidate| !is_false_positive(candidate))
        .collect();
    file_references.sort();
    file_references.dedup();

    let mut mentions: Vec<String> = MENTION_RE
        .find_iter(&text)
        .map(|m| m.as_str().to_string())
        .collect();
    mentions.sort();
    mentions.dedup();

    RequestSummary {
        file_references,
        mentions,
        estimated_tokens: text.len() / 4,
        tool_count: body
            .get("tools")
            .and_then(Value::as_array)
            .map_or(0, Vec::len),
        message_count: body
            .get("messages")
            .and_then(Value::as_array)
            .map_or(0, Vec::len),
    }
}

/// Concatenate all text content from the messages.
fn collect_text(body: &Value) -> String {
    let mut out = String::new();
    let Some(messages) = body.get("messages").and_then(Value::as_array) else {
        return out;
    };

    for message in messages {
        match message.get("content") {
            Some(Value::String(s)) => {
                out.push_str(s);
                out.push('\n');
            }
            Some(Value::Array(blocks)) => {
                for block in blocks {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        out.push_str(text);
                        out.push('\n');
                    }
                }
            }
            _ => {}
        }
    }
    out
}

/// Filter URLs, version strings, and dependency/VCS noise.
fn is_false_positive(candidate: &str) -> bool {
    candidate.contains("://")
        || candidate.starts_with("//")
        || candidate.contains("node_modules")
        || candidate.contains(".git")
        || VERSION_RE.is_match(candidate)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
