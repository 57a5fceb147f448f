//! Content-derived cache keys.
//!
//! The key is a pure function of the *non-thinking* content of an assistant
//! message: thinking and redacted-thinking blocks are skipped, tool inputs are
//! serialised with sorted object keys, whitespace runs collapse to single
//! spaces. Adding or removing thinking blocks therefore never changes the key.
//!
//! Key form: `v2:<fnv1a32>:<length>`. The length of the normalised string is
//! included to reduce collisions on short inputs.

use serde_json::Value;

use relay_core::content::is_thinking_block;

/// Derive the cache key for an assistant message's content.
///
/// `content` is either a plain string or an ordered array of content blocks.
/// Returns `None` when the non-thinking content is empty — an empty message
/// has no identity to cache under.
#[must_use]
pub fn content_key(content: &Value) -> Option<String> {
    let canonical = canonical_text(content);
    let normalised = normalise_whitespace(&canonical);
    if normalised.is_empty() {
        return None;
    }
    Some(format!(
        "v2:{}:{}",
        fnv1a32(normalised.as_bytes()),
        normalised.len()
    ))
}

/// Flatten content to its canonical keying text, skipping thinking blocks.
fn canonical_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(blocks) => {
            let parts: Vec<String> = blocks
                .iter()
                .filter(|b| !is_thinking_block(b))
                .filter_map(block_text)
                .collect();
            parts.join("|")
        }
        _ => String::new(),
    }
}

/// Canonical text for a single non-thinking block.
fn block_text(block: &Value) -> Option<String> {
    match block.get("type").and_then(Value::as_str) {
        Some("text") => block
            .get("text")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        Some("tool_use") => {
            let name = block.get("name").and_then(Value::as_str).unwrap_or("");
            let input = block.get("input").unwrap_or(&Value::Null);
            Some(format!("tool:{name}:{}", stable_json(input)))
        }
        Some("tool_result") => {
            let id = block
                .get("tool_use_id")
                .and_then(Value::as_str)
                .unwrap_or("");
            let content = block.get("content").unwrap_or(&Value::Null);
            Some(format!("result:{id}:{}", value_as_string(content)))
        }
        _ => None,
    }
}

/// Render a value as a plain string: strings verbatim, everything else as
/// stable JSON.
fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => stable_json(other),
    }
}

/// Serialise with object keys sorted at every level, so logically equal tool
/// inputs key identically regardless of field order.
fn stable_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(k).unwrap_or_default(),
                        stable_json(&map[k])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(stable_json).collect();
            format!("[{}]", parts.join(","))
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Collapse whitespace runs to single spaces and trim.
fn normalise_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 32-bit FNV-1a over the normalised bytes.
fn fnv1a32(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
