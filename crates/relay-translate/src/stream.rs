//! Stateful upstream-SSE → OpenAI-chunk translator.
//!
//! One instance per upstream response. Bytes arrive in whatever sizes the
//! transport produces; a line buffer reassembles SSE frames, so emitted
//! output is identical for any byte-split of the same stream. Only fully
//! newline-terminated lines are parsed — a trailing fragment waits for the
//! next read and is dropped if the stream dies first.

use std::collections::HashMap;

use bytes::BytesMut;
use serde_json::Value;

use relay_core::ThinkingBlock;

use crate::events::{EventContentBlock, EventDelta, EventUsage, UpstreamEvent};
use crate::openai::{
    CHUNK_OBJECT, ChatCompletionChunk, ChunkChoice, Delta, FunctionDelta, ToolCallDelta, Usage,
    chunk_id_from, map_finish_reason,
};

/// One translated output item.
#[derive(Clone, Debug)]
pub enum StreamItem {
    /// An OpenAI chunk to forward as `data: <json>`.
    Chunk(ChatCompletionChunk),
    /// The terminal `data: [DONE]` marker.
    Done,
}

/// Per-tool-call accumulation state.
#[derive(Clone, Debug)]
struct ToolCallTracker {
    /// OpenAI-side tool-call slot, in order of appearance.
    slot: usize,
    id: String,
    name: String,
    /// Arguments accumulated across `input_json_delta` fragments.
    arguments: String,
}

/// In-progress thinking block while between start and stop events.
#[derive(Clone, Debug, Default)]
struct ThinkingCapture {
    active: bool,
    redacted: bool,
    thinking: String,
    signature: String,
}

/// The translator state machine.
pub struct StreamTranslator {
    /// Original client model string, echoed on every chunk.
    model: String,
    /// Stable chunk id, derived once from the upstream message id.
    chunk_id: Option<String>,
    /// Upstream model actually answering (log-only).
    upstream_model: Option<String>,
    created: i64,
    buffer: BytesMut,
    tools: HashMap<usize, ToolCallTracker>,
    usage: EventUsage,
    stop_reason: Option<String>,
    current_thinking: ThinkingCapture,
    captured_thinking: Option<ThinkingBlock>,
    accumulated_text: String,
    clean_end: bool,
}

impl StreamTranslator {
    /// Create a translator echoing `original_model` on every chunk.
    #[must_use]
    pub fn new(original_model: impl Into<String>) -> Self {
        Self {
            model: original_model.into(),
            chunk_id: None,
            upstream_model: None,
            created: chrono::Utc::now().timestamp(),
            buffer: BytesMut::with_capacity(8192),
            tools: HashMap::new(),
            usage: EventUsage::default(),
            stop_reason: None,
            current_thinking: ThinkingCapture::default(),
            captured_thinking: None,
            accumulated_text: String::new(),
            clean_end: false,
        }
    }

    /// Feed upstream bytes; returns the output items they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamItem> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();

        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line_bytes = self.buffer.split_to(newline_pos + 1);
            line_bytes.truncate(line_bytes.len() - 1);
            if line_bytes.last() == Some(&b'\r') {
                line_bytes.truncate(line_bytes.len() - 1);
            }

            let Ok(line) = std::str::from_utf8(&line_bytes) else {
                continue;
            };
            let Some(data) = extract_sse_data(line) else {
                continue;
            };
            match serde_json::from_str::<UpstreamEvent>(data) {
                Ok(event) => out.extend(self.handle_event(event)),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed upstream event");
                }
            }
        }

        out
    }

    /// Whether the upstream signalled a clean `message_stop`.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.clean_end
    }

    /// The thinking block captured from this stream, if any.
    #[must_use]
    pub fn captured_thinking(&self) -> Option<&ThinkingBlock> {
        self.captured_thinking.as_ref()
    }

    /// Last stop reason seen (upstream vocabulary).
    #[must_use]
    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }

    /// The upstream model that actually answered (log-only).
    #[must_use]
    pub fn upstream_model(&self) -> Option<&str> {
        self.upstream_model.as_deref()
    }

    /// Plain text accumulated from text deltas.
    #[must_use]
    pub fn accumulated_text(&self) -> &str {
        &self.accumulated_text
    }

    /// Canonical content and thinking block to cache after a clean stream.
    ///
    /// `None` unless the stream closed cleanly, captured a signed thinking
    /// block, and produced some non-thinking content to key on.
    #[must_use]
    pub fn cache_payload(&self) -> Option<(Value, ThinkingBlock)> {
        if !self.clean_end {
            return None;
        }
        let block = self.captured_thinking.clone()?;
        let content = self.canonical_content()?;
        Some((content, block))
    }

    /// Canonical non-thinking content: one text block plus tool_use blocks.
    fn canonical_content(&self) -> Option<Value> {
        let mut blocks = Vec::new();
        if !self.accumulated_text.is_empty() {
            blocks.push(serde_json::json!({
                "type": "text",
                "text": self.accumulated_text,
            }));
        }

        let mut trackers: Vec<&ToolCallTracker> = self.tools.values().collect();
        trackers.sort_by_key(|t| t.slot);
        for tracker in trackers {
            let input: Value =
                serde_json::from_str(&tracker.arguments).unwrap_or_else(|_| serde_json::json!({}));
            blocks.push(serde_json::json!({
                "type": "tool_use",
                "id": tracker.id,
                "name": tracker.name,
                "input": input,
            }));
        }

        if blocks.is_empty() {
            return None;
        }
        Some(Value::Array(blocks))
    }

    fn handle_event(&mut self, event: UpstreamEvent) -> Vec<StreamItem> {
        match event {
            UpstreamEvent::MessageStart { message } => {
                if let Some(id) = &message.id {
                    self.chunk_id = Some(chunk_id_from(id));
                }
                self.upstream_model = message.model;
                self.merge_usage(&message.usage);

                vec![StreamItem::Chunk(self.chunk(
                    Delta {
                        role: Some("assistant".to_string()),
                        content: Some(String::new()),
                        tool_calls: None,
                    },
                    None,
                ))]
            }

            UpstreamEvent::ContentBlockStart {
                index,
                content_block,
            } => self.handle_block_start(index, content_block),

            UpstreamEvent::ContentBlockDelta { index, delta } => {
                self.handle_block_delta(index, delta)
            }

            UpstreamEvent::ContentBlockStop { .. } => {
                self.finish_thinking_block();
                Vec::new()
            }

            UpstreamEvent::MessageDelta { delta, usage } => {
                if let Some(usage) = &usage {
                    self.merge_usage(usage);
                }
                match delta.stop_reason {
                    Some(stop_reason) => {
                        let finish = map_finish_reason(&stop_reason);
                        self.stop_reason = Some(stop_reason);
                        vec![StreamItem::Chunk(self.chunk(Delta::default(), Some(finish)))]
                    }
                    None => Vec::new(),
                }
            }

            UpstreamEvent::MessageStop => {
                self.clean_end = true;
                let mut out = Vec::new();
                if self.usage.input_tokens + self.usage.output_tokens > 0 {
                    let mut chunk = self.chunk(Delta::default(), None);
                    chunk.usage = Some(Usage::from_counts(
                        self.usage.input_tokens,
                        self.usage.output_tokens,
                        self.usage.cache_read_input_tokens,
                    ));
                    out.push(StreamItem::Chunk(chunk));
                }
                out.push(StreamItem::Done);
                out
            }

            UpstreamEvent::Error { error } => {
                tracing::warn!(
                    error_type = %error.error_type,
                    message = %error.message,
                    "upstream emitted in-stream error"
                );
                Vec::new()
            }

            UpstreamEvent::Ping | UpstreamEvent::Unknown => Vec::new(),
        }
    }

    fn handle_block_start(
        &mut self,
        index: usize,
        content_block: EventContentBlock,
    ) -> Vec<StreamItem> {
        match content_block {
            // Text is emitted as deltas arrive.
            EventContentBlock::Text { .. } => Vec::new(),

            EventContentBlock::ToolUse { id, name, .. } => {
                let slot = self.tools.len();
                let _ = self.tools.insert(
                    index,
                    ToolCallTracker {
                        slot,
                        id: id.clone(),
                        name: name.clone(),
                        arguments: String::new(),
                    },
                );

                vec![StreamItem::Chunk(self.chunk(
                    Delta {
                        role: None,
                        content: None,
                        tool_calls: Some(vec![ToolCallDelta {
                            index: slot,
                            id: Some(id),
                            call_type: Some("function".to_string()),
                            function: FunctionDelta {
                                name: Some(name),
                                arguments: String::new(),
                            },
                        }]),
                    },
                    None,
                ))]
            }

            EventContentBlock::Thinking {
                thinking,
                signature,
            } => {
                self.current_thinking = ThinkingCapture {
                    active: true,
                    redacted: false,
                    thinking,
                    signature: signature.unwrap_or_default(),
                };
                Vec::new()
            }

            EventContentBlock::RedactedThinking { .. } => {
                self.current_thinking = ThinkingCapture {
                    active: true,
                    redacted: true,
                    ..ThinkingCapture::default()
                };
                Vec::new()
            }

            EventContentBlock::Unknown => Vec::new(),
        }
    }

    fn handle_block_delta(&mut self, index: usize, delta: EventDelta) -> Vec<StreamItem> {
        match delta {
            EventDelta::TextDelta { text } => {
                self.accumulated_text.push_str(&text);
                vec![StreamItem::Chunk(self.chunk(
                    Delta {
                        role: None,
                        content: Some(text),
                        tool_calls: None,
                    },
                    None,
                ))]
            }

            EventDelta::ThinkingDelta { thinking } => {
                if self.current_thinking.active && !self.current_thinking.redacted {
                    self.current_thinking.thinking.push_str(&thinking);
                }
                Vec::new()
            }

            EventDelta::SignatureDelta { signature } => {
                if self.current_thinking.active {
                    self.current_thinking.signature.push_str(&signature);
                }
                Vec::new()
            }

            EventDelta::InputJsonDelta { partial_json } => {
                self.handle_tool_arguments(index, partial_json)
            }

            EventDelta::Unknown => Vec::new(),
        }
    }

    /// Accumulate a tool-input fragment and emit the newly-added part.
    ///
    /// The upstream sometimes sends cumulative fragments (each a
    /// prefix-extending superset of the last) and sometimes pure deltas. A
    /// fragment that starts with everything accumulated so far is treated as
    /// cumulative and only its suffix is emitted; anything else is a delta
    /// and is emitted verbatim.
    fn handle_tool_arguments(&mut self, index: usize, partial_json: String) -> Vec<StreamItem> {
        let Some(tracker) = self.tools.get_mut(&index) else {
            tracing::warn!(index, "tool input delta for unknown block");
            return Vec::new();
        };

        let new_part = if partial_json.starts_with(&tracker.arguments) {
            let suffix = partial_json[tracker.arguments.len()..].to_string();
            tracker.arguments = partial_json;
            suffix
        } else {
            tracker.arguments.push_str(&partial_json);
            partial_json
        };

        if new_part.is_empty() {
            return Vec::new();
        }

        let slot = tracker.slot;
        vec![StreamItem::Chunk(self.chunk(
            Delta {
                role: None,
                content: None,
                tool_calls: Some(vec![ToolCallDelta {
                    index: slot,
                    id: None,
                    call_type: None,
                    function: FunctionDelta {
                        name: None,
                        arguments: new_part,
                    },
                }]),
            },
            None,
        ))]
    }

    /// Capture the in-progress thinking block at `content_block_stop`.
    fn finish_thinking_block(&mut self) {
        if !self.current_thinking.active {
            return;
        }
        let capture = std::mem::take(&mut self.current_thinking);
        if !capture.redacted && !capture.signature.is_empty() && self.captured_thinking.is_none() {
            self.captured_thinking = Some(ThinkingBlock::new(capture.thinking, capture.signature));
        }
    }

    /// Overwrite usage counters with any non-zero incoming fields. The
    /// upstream reports cumulative totals, not increments.
    fn merge_usage(&mut self, incoming: &EventUsage) {
        if incoming.input_tokens > 0 {
            self.usage.input_tokens = incoming.input_tokens;
        }
        if incoming.output_tokens > 0 {
            self.usage.output_tokens = incoming.output_tokens;
        }
        if incoming.cache_creation_input_tokens > 0 {
            self.usage.cache_creation_input_tokens = incoming.cache_creation_input_tokens;
        }
        if incoming.cache_read_input_tokens > 0 {
            self.usage.cache_read_input_tokens = incoming.cache_read_input_tokens;
        }
    }

    fn chunk(&self, delta: Delta, finish_reason: Option<String>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self
                .chunk_id
                .clone()
                .unwrap_or_else(|| "chatcmpl-pending".to_string()),
            object: CHUNK_OBJECT.to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
            usage: None,
        }
    }
}

/// Extract the payload of an SSE `data:` line.
///
/// Returns `None` for blanks, comments, `event:`/`id:` fields, and empty
/// data.
fn extract_sse_data(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }
    let data = trimmed
        .strip_prefix("data: ")
        .or_else(|| trimmed.strip_prefix("data:"))?
        .trim();
    if data.is_empty() {
        return None;
    }
    Some(data)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Render events as an SSE transcript with `event:` framing lines, the
    /// way the upstream actually sends them.
    fn sse(events: &[&str]) -> String {
        events
            .iter()
            .map(|e| format!("event: whatever\ndata: {e}\n\n"))
            .collect()
    }

    /// The canonical text-only transcript from the end-to-end scenario.
    fn text_only_transcript() -> String {
        sse(&[
            r#"{"type":"message_start","message":{"id":"msg_AAA","model":"claude-sonnet-4-5","usage":{"input_tokens":10}}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hel"}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"lo"}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"!"}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"input_tokens":10,"output_tokens":3,"cache_read_input_tokens":4}}"#,
            r#"{"type":"message_stop"}"#,
        ])
    }

    fn chunks(items: &[StreamItem]) -> Vec<&ChatCompletionChunk> {
        items
            .iter()
            .filter_map(|i| match i {
                StreamItem::Chunk(c) => Some(c),
                StreamItem::Done => None,
            })
            .collect()
    }

    // ── end-to-end scenario: text-only streaming ─────────────────────────

    #[test]
    fn text_only_stream_translates() {
        let mut translator = StreamTranslator::new("claude-4-sonnet-high");
        let items = translator.push(text_only_transcript().as_bytes());

        // role chunk, 3 content, finish, usage, done
        assert_eq!(items.len(), 7);
        let chunks = chunks(&items);

        let opening = chunks[0];
        assert_eq!(opening.id, "chatcmpl-AAA");
        assert_eq!(opening.model, "claude-4-sonnet-high");
        assert_eq!(opening.choices[0].delta.role.as_deref(), Some("assistant"));
        assert_eq!(opening.choices[0].delta.content.as_deref(), Some(""));
        assert!(opening.choices[0].finish_reason.is_none());

        let texts: Vec<&str> = chunks[1..4]
            .iter()
            .map(|c| c.choices[0].delta.content.as_deref().unwrap())
            .collect();
        assert_eq!(texts, vec!["Hel", "lo", "!"]);

        let finish = chunks[4];
        assert_eq!(finish.choices[0].finish_reason.as_deref(), Some("stop"));
        assert!(finish.choices[0].delta.content.is_none());

        let usage = chunks[5].usage.as_ref().unwrap();
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.completion_tokens, 3);
        assert_eq!(usage.total_tokens, 13);
        assert_eq!(usage.prompt_tokens_details.cached_tokens, 4);

        assert!(matches!(items.last().unwrap(), StreamItem::Done));
        assert!(translator.is_complete());
        assert_eq!(translator.accumulated_text(), "Hello!");
    }

    #[test]
    fn every_chunk_echoes_original_model() {
        let mut translator = StreamTranslator::new("my-alias");
        let items = translator.push(text_only_transcript().as_bytes());
        for chunk in chunks(&items) {
            assert_eq!(chunk.model, "my-alias");
        }
    }

    #[test]
    fn done_is_last_and_unique() {
        let mut translator = StreamTranslator::new("m");
        let items = translator.push(text_only_transcript().as_bytes());
        let done_positions: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, i)| matches!(i, StreamItem::Done))
            .map(|(n, _)| n)
            .collect();
        assert_eq!(done_positions, vec![items.len() - 1]);
    }

    #[test]
    fn usage_chunk_precedes_done() {
        let mut translator = StreamTranslator::new("m");
        let items = translator.push(text_only_transcript().as_bytes());
        let usage_pos = items
            .iter()
            .position(|i| matches!(i, StreamItem::Chunk(c) if c.usage.is_some()))
            .unwrap();
        assert_eq!(usage_pos, items.len() - 2);
    }

    // ── chunk-boundary independence ──────────────────────────────────────

    fn serialize_items(items: &[StreamItem]) -> Vec<String> {
        items
            .iter()
            .map(|i| match i {
                StreamItem::Chunk(c) => serde_json::to_string(c).unwrap(),
                StreamItem::Done => "[DONE]".to_string(),
            })
            .collect()
    }

    proptest! {
        #[test]
        fn output_independent_of_byte_splits(split_points in proptest::collection::vec(0usize..2000, 0..12)) {
            let transcript = text_only_transcript();
            let bytes = transcript.as_bytes();

            let mut whole = StreamTranslator::new("m");
            let expected = serialize_items(&whole.push(bytes));

            let mut cuts: Vec<usize> = split_points.iter().map(|p| p % bytes.len()).collect();
            cuts.sort_unstable();
            cuts.dedup();

            let mut split = StreamTranslator::new("m");
            let mut got = Vec::new();
            let mut start = 0;
            for cut in cuts {
                got.extend(serialize_items(&split.push(&bytes[start..cut])));
                start = cut;
            }
            got.extend(serialize_items(&split.push(&bytes[start..])));

            // `created` is stamped per translator; normalise before comparing.
            let normalise = |v: Vec<String>| -> Vec<String> {
                v.into_iter()
                    .map(|s| s.replace(&format!("\"created\":{}", whole.created), "\"created\":0"))
                    .collect()
            };
            let got_norm: Vec<String> = got
                .into_iter()
                .map(|s| s.replace(&format!("\"created\":{}", split.created), "\"created\":0"))
                .collect();
            prop_assert_eq!(normalise(expected), got_norm);
        }
    }

    #[test]
    fn split_mid_line_is_reassembled() {
        let transcript = text_only_transcript();
        let bytes = transcript.as_bytes();
        let mut translator = StreamTranslator::new("m");

        let mut items = Vec::new();
        // Feed one byte at a time — the worst possible transport.
        for b in bytes {
            items.extend(translator.push(&[*b]));
        }
        assert_eq!(items.len(), 7);
        assert!(matches!(items.last().unwrap(), StreamItem::Done));
    }

    // ── tool-call argument accumulation ──────────────────────────────────

    fn tool_call_transcript(deltas: &[&str]) -> String {
        let mut events = vec![
            r#"{"type":"message_start","message":{"id":"msg_T","model":"claude-sonnet-4-5"}}"#.to_string(),
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"tu_1","name":"search"}}"#.to_string(),
        ];
        for d in deltas {
            events.push(format!(
                r#"{{"type":"content_block_delta","index":0,"delta":{{"type":"input_json_delta","partial_json":{}}}}}"#,
                serde_json::to_string(d).unwrap()
            ));
        }
        events.push(r#"{"type":"content_block_stop","index":0}"#.to_string());
        events.push(r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"}}"#.to_string());
        events.push(r#"{"type":"message_stop"}"#.to_string());
        let refs: Vec<&str> = events.iter().map(String::as_str).collect();
        sse(&refs)
    }

    fn emitted_arguments(items: &[StreamItem]) -> Vec<String> {
        chunks(items)
            .iter()
            .filter_map(|c| c.choices[0].delta.tool_calls.as_ref())
            .flat_map(|tcs| tcs.iter().map(|tc| tc.function.arguments.clone()))
            .collect()
    }

    #[test]
    fn cumulative_partial_json_emits_suffixes() {
        // Literal scenario: cumulative fragments {"q" → {"q":"fo → {"q":"foo"}
        let mut translator = StreamTranslator::new("m");
        let items =
            translator.push(tool_call_transcript(&[r#"{"q"#, r#"{"q":"fo"#, r#"{"q":"foo"}"#]).as_bytes());

        let args = emitted_arguments(&items);
        assert_eq!(args, vec!["", r#"{"q"#, r#":"fo"#, r#"o"}"#]);
    }

    #[test]
    fn pure_delta_partial_json_emits_verbatim() {
        let mut translator = StreamTranslator::new("m");
        let items =
            translator.push(tool_call_transcript(&[r#"{"q":"#, r#""foo""#, r#"}"#]).as_bytes());

        let args = emitted_arguments(&items);
        assert_eq!(args, vec!["", r#"{"q":"#, r#""foo""#, "}"]);
    }

    #[test]
    fn emitted_arguments_concatenate_to_accumulated() {
        // Mixed cumulative and delta fragments.
        let deltas = [r#"{"a""#, r#"{"a":1"#, r#",  "b":2"#, r#"{"a":1,  "b":2}"#];
        let mut translator = StreamTranslator::new("m");
        let items = translator.push(tool_call_transcript(&deltas).as_bytes());

        let concatenated: String = emitted_arguments(&items).concat();
        assert_eq!(concatenated, r#"{"a":1,  "b":2}"#);
    }

    #[test]
    fn tool_call_opening_chunk_carries_identity() {
        let mut translator = StreamTranslator::new("m");
        let items = translator.push(tool_call_transcript(&[]).as_bytes());

        let opening_tc = chunks(&items)
            .iter()
            .find_map(|c| c.choices[0].delta.tool_calls.as_ref())
            .unwrap()[0]
            .clone();
        assert_eq!(opening_tc.index, 0);
        assert_eq!(opening_tc.id.as_deref(), Some("tu_1"));
        assert_eq!(opening_tc.call_type.as_deref(), Some("function"));
        assert_eq!(opening_tc.function.name.as_deref(), Some("search"));
        assert_eq!(opening_tc.function.arguments, "");
    }

    #[test]
    fn tool_use_finish_reason_maps() {
        let mut translator = StreamTranslator::new("m");
        let items = translator.push(tool_call_transcript(&[r#"{}"#]).as_bytes());
        let finish = chunks(&items)
            .iter()
            .find_map(|c| c.choices[0].finish_reason.clone())
            .unwrap();
        assert_eq!(finish, "tool_calls");
    }

    #[test]
    fn second_tool_call_gets_next_slot() {
        let events = [
            r#"{"type":"message_start","message":{"id":"msg_T"}}"#,
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"tu_1","name":"first"}}"#,
            r#"{"type":"content_block_stop","index":1}"#,
            r#"{"type":"content_block_start","index":2,"content_block":{"type":"tool_use","id":"tu_2","name":"second"}}"#,
        ];
        let mut translator = StreamTranslator::new("m");
        let items = translator.push(sse(&events).as_bytes());

        let slots: Vec<usize> = chunks(&items)
            .iter()
            .filter_map(|c| c.choices[0].delta.tool_calls.as_ref())
            .map(|tcs| tcs[0].index)
            .collect();
        assert_eq!(slots, vec![0, 1]);
    }

    // ── thinking capture ─────────────────────────────────────────────────

    fn thinking_transcript() -> String {
        sse(&[
            r#"{"type":"message_start","message":{"id":"msg_TH","usage":{"input_tokens":5}}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"thinking","thinking":""}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"step "}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"one"}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"signature_delta","signature":"sigAB"}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"signature_delta","signature":"CD=="}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"text_delta","text":"Answer"}}"#,
            r#"{"type":"content_block_stop","index":1}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":2}}"#,
            r#"{"type":"message_stop"}"#,
        ])
    }

    #[test]
    fn thinking_is_captured_not_forwarded() {
        let mut translator = StreamTranslator::new("m");
        let items = translator.push(thinking_transcript().as_bytes());

        // No chunk ever contains thinking text.
        for chunk in chunks(&items) {
            if let Some(content) = &chunk.choices[0].delta.content {
                assert!(!content.contains("step"));
            }
        }

        let captured = translator.captured_thinking().unwrap();
        assert_eq!(captured.thinking, "step one");
        assert_eq!(captured.signature, "sigABCD==");
    }

    #[test]
    fn cache_payload_after_clean_thinking_stream() {
        let mut translator = StreamTranslator::new("m");
        let _ = translator.push(thinking_transcript().as_bytes());

        let (content, block) = translator.cache_payload().unwrap();
        assert_eq!(block.thinking, "step one");
        let blocks = content.as_array().unwrap();
        assert_eq!(blocks[0]["type"], "text");
        assert_eq!(blocks[0]["text"], "Answer");
    }

    #[test]
    fn redacted_thinking_not_captured() {
        let events = [
            r#"{"type":"message_start","message":{"id":"msg_R"}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"redacted_thinking","data":"xxxx"}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"message_stop"}"#,
        ];
        let mut translator = StreamTranslator::new("m");
        let _ = translator.push(sse(&events).as_bytes());
        assert!(translator.captured_thinking().is_none());
    }

    #[test]
    fn unsigned_thinking_not_captured() {
        let events = [
            r#"{"type":"message_start","message":{"id":"msg_U"}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"thinking","thinking":"loose"}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"message_stop"}"#,
        ];
        let mut translator = StreamTranslator::new("m");
        let _ = translator.push(sse(&events).as_bytes());
        assert!(translator.captured_thinking().is_none());
    }

    // ── boundary behaviours ──────────────────────────────────────────────

    #[test]
    fn truncated_stream_emits_no_done() {
        let transcript = tool_call_transcript(&[r#"{"q":"unfini"#]);
        // Cut the transcript in the middle of the partial_json event line.
        let cut = transcript.find("unfini").unwrap();
        let mut translator = StreamTranslator::new("m");
        let items = translator.push(transcript[..cut].as_bytes());

        assert!(!items.iter().any(|i| matches!(i, StreamItem::Done)));
        assert!(
            !chunks(&items)
                .iter()
                .any(|c| c.choices[0].finish_reason.is_some()),
            "no finish reason may be forged for a truncated stream"
        );
        assert!(!translator.is_complete());
        assert!(translator.cache_payload().is_none());
    }

    #[test]
    fn zero_usage_stream_still_emits_done() {
        let events = [
            r#"{"type":"message_start","message":{"id":"msg_Z"}}"#,
            r#"{"type":"message_stop"}"#,
        ];
        let mut translator = StreamTranslator::new("m");
        let items = translator.push(sse(&events).as_bytes());

        assert!(matches!(items.last().unwrap(), StreamItem::Done));
        assert!(chunks(&items).iter().all(|c| c.usage.is_none()));
    }

    #[test]
    fn unknown_events_and_pings_are_skipped() {
        let events = [
            r#"{"type":"ping"}"#,
            r#"{"type":"brand_new_event","payload":1}"#,
            r#"{"type":"message_start","message":{"id":"msg_S"}}"#,
        ];
        let mut translator = StreamTranslator::new("m");
        let items = translator.push(sse(&events).as_bytes());
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn malformed_json_line_skipped() {
        let input = "data: {broken json\n\ndata: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_K\"}}\n\n";
        let mut translator = StreamTranslator::new("m");
        let items = translator.push(input.as_bytes());
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn crlf_lines_handled() {
        let input = "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_C\"}}\r\n\r\n";
        let mut translator = StreamTranslator::new("m");
        let items = translator.push(input.as_bytes());
        assert_eq!(items.len(), 1);
        assert_eq!(chunks(&items)[0].id, "chatcmpl-C");
    }

    #[test]
    fn in_stream_error_event_is_logged_not_forwarded() {
        let events = [
            r#"{"type":"message_start","message":{"id":"msg_E"}}"#,
            r#"{"type":"error","error":{"type":"overloaded_error","message":"busy"}}"#,
        ];
        let mut translator = StreamTranslator::new("m");
        let items = translator.push(sse(&events).as_bytes());
        assert_eq!(items.len(), 1, "error event must not produce chunks");
    }

    // ── extract_sse_data ─────────────────────────────────────────────────

    #[test]
    fn extract_handles_prefix_variants() {
        assert_eq!(extract_sse_data("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(extract_sse_data("data:{\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(extract_sse_data("event: message_start"), None);
        assert_eq!(extract_sse_data(": comment"), None);
        assert_eq!(extract_sse_data(""), None);
        assert_eq!(extract_sse_data("data: "), None);
    }
}
