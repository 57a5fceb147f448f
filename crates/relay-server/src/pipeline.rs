//! The chat request pipeline.
//!
//! One inbound request flows through, in order: inbound auth gate → BYOK
//! probe bypass → selective gateway → variant resolution → system lifting →
//! upstream body construction → thinking injection (with silent downgrade) →
//! dispatch → response translation → post-stream cache write.

use axum::Json;
use axum::body::Body;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::StreamExt;
use serde_json::{Value, json};

use relay_cache::ThinkingCache;
use relay_core::{CLI_PERSONA, ThinkingBlock};
use relay_translate::context::summarize_request;
use relay_translate::openai::{
    CHUNK_OBJECT, COMPLETION_OBJECT, ChatCompletion, ChatCompletionChunk, ChunkChoice,
    CompletionChoice, CompletionMessage, Delta, Usage,
};
use relay_translate::stream::{StreamItem, StreamTranslator};
use relay_translate::{ModelVariant, is_claude_family, resolve_variant, to_chat_completion};

use crate::errors::ProxyError;
use crate::state::AppState;
use crate::upstream::messages_request;

/// Canned content returned to key-check probes.
const BYOK_REPLY: &str = "Connection successful!";

/// An upstream-ready request.
#[derive(Clone, Debug)]
pub struct PreparedRequest {
    /// Whitelisted upstream body.
    pub body: Value,
    /// Whether the client asked for a streaming response.
    pub stream: bool,
    /// Whether thinking is (still) enabled.
    pub thinking_enabled: bool,
    /// The client's temperature, saved for the downgrade path.
    original_temperature: Option<Value>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline entry
// ─────────────────────────────────────────────────────────────────────────────

/// Run the full pipeline for one chat request.
///
/// `openai_path` is true for `/v1/chat/completions`; together with embedded
/// `system` roles it decides whether the response is translated to OpenAI
/// format or passed through.
pub async fn handle_chat(
    state: AppState,
    openai_path: bool,
    headers: HeaderMap,
    body: Value,
) -> Result<Response, ProxyError> {
    check_inbound_auth(&state, &headers)?;

    let summary = summarize_request(&body);
    tracing::info!(
        messages = summary.message_count,
        tools = summary.tool_count,
        files = summary.file_references.len(),
        est_tokens = summary.estimated_tokens,
        "chat request"
    );

    let model = body
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let stream = body.get("stream").and_then(Value::as_bool).unwrap_or(false);

    if is_byok_probe(&body) {
        tracing::debug!("answering key-check probe with canned reply");
        return Ok(byok_response(stream, &model));
    }
    if !is_claude_family(&model) {
        return Err(ProxyError::ModelUnsupported(model));
    }

    let variant = resolve_variant(&model);
    let mut client_body = body;
    let had_embedded_system = has_system_role_messages(&client_body);
    lift_system_messages(&mut client_body);

    let token = state
        .oauth
        .access_token()
        .await
        .map_err(|e| {
            tracing::warn!("token refresh failed: {e}");
            ProxyError::AuthMissing
        })?
        .ok_or(ProxyError::AuthMissing)?;

    let mut prepared = build_upstream_body(&client_body, &variant);

    if prepared.thinking_enabled {
        if let Some(messages) = prepared
            .body
            .get_mut("messages")
            .and_then(Value::as_array_mut)
        {
            let report = state.cache.inject(messages).await;
            tracing::debug!(
                injected = report.injected,
                missing = report.missing,
                "thinking injection"
            );
            if !report.can_use_thinking {
                tracing::warn!(
                    injected = report.injected,
                    missing = report.missing,
                    "cached thinking blocks missing, downgrading to non-thinking request"
                );
                downgrade_thinking(&mut prepared);
            }
        }
    }

    let resp = messages_request(
        &state.http,
        &state.messages_url,
        &token,
        &prepared.body,
        prepared.stream,
        prepared.thinking_enabled,
    )
    .send()
    .await
    .map_err(|e| ProxyError::Internal(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let body_text = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProxyError::AuthRejected(body_text));
        }
        return Err(ProxyError::Upstream {
            status: status.as_u16(),
            body: body_text,
        });
    }

    let translate = openai_path || had_embedded_system;
    if prepared.stream {
        Ok(stream_response(
            &state,
            resp,
            variant.original_model,
            translate,
        ))
    } else {
        let upstream_body: Value = resp
            .json()
            .await
            .map_err(|e| ProxyError::Internal(e.to_string()))?;
        cache_from_response(&state, &upstream_body);

        if translate {
            let completion = to_chat_completion(&upstream_body, &variant.original_model)
                .map_err(|e| ProxyError::Internal(e.to_string()))?;
            Ok(Json(completion).into_response())
        } else {
            Ok(Json(upstream_body).into_response())
        }
    }
}

/// Reject a mismatching inbound bearer when an API key gate is configured.
fn check_inbound_auth(state: &AppState, headers: &HeaderMap) -> Result<(), ProxyError> {
    let Some(expected) = state.config.inbound_api_key() else {
        return Ok(());
    };
    let presented = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if presented == Some(expected) {
        Ok(())
    } else {
        Err(ProxyError::InvalidApiKey)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request rewriting
// ─────────────────────────────────────────────────────────────────────────────

/// Whether `messages` embeds `system`-role entries (a non-first-party client).
#[must_use]
pub fn has_system_role_messages(body: &Value) -> bool {
    body.get("messages")
        .and_then(Value::as_array)
        .is_some_and(|messages| {
            messages
                .iter()
                .any(|m| m.get("role").and_then(Value::as_str) == Some("system"))
        })
}

/// Normalise the system prompt.
///
/// Unless the system prompt already declares the CLI persona: lift embedded
/// `system`-role messages out of `messages`, prepend the persona line, and
/// normalise `system` to an array of `{type:"text", text}` blocks.
pub fn lift_system_messages(body: &mut Value) {
    let mut system_blocks = match body.get("system") {
        Some(Value::String(s)) => vec![json!({"type": "text", "text": s})],
        Some(Value::Array(blocks)) => blocks.clone(),
        _ => Vec::new(),
    };

    let declares_persona = system_blocks.iter().any(|b| {
        b.get("text")
            .and_then(Value::as_str)
            .is_some_and(|t| t.contains(CLI_PERSONA))
    });
    if declares_persona {
        return;
    }

    if let Some(messages) = body.get_mut("messages").and_then(Value::as_array_mut) {
        let mut kept = Vec::with_capacity(messages.len());
        for message in messages.drain(..) {
            if message.get("role").and_then(Value::as_str) == Some("system") {
                let text = flatten_text(message.get("content").unwrap_or(&Value::Null));
                if !text.is_empty() {
                    system_blocks.push(json!({"type": "text", "text": text}));
                }
            } else {
                kept.push(message);
            }
        }
        *messages = kept;
    }

    system_blocks.insert(0, json!({"type": "text", "text": CLI_PERSONA}));
    body["system"] = Value::Array(system_blocks);
}

/// Build the whitelisted upstream body from the (lifted) client body.
#[must_use]
pub fn build_upstream_body(client_body: &Value, variant: &ModelVariant) -> PreparedRequest {
    let stream = client_body
        .get("stream")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let mut body = json!({
        "model": variant.upstream_model,
        "messages": client_body.get("messages").cloned().unwrap_or_else(|| json!([])),
        "max_tokens": if variant.max_tokens > 0 { variant.max_tokens } else { 4096 },
        "stream": stream,
    });

    if let Some(system) = client_body.get("system") {
        body["system"] = system.clone();
    }
    // Either spelling is accepted for stop sequences.
    if let Some(stops) = client_body
        .get("stop_sequences")
        .or_else(|| client_body.get("stopSequences"))
    {
        if !stops.is_null() {
            body["stop_sequences"] = stops.clone();
        }
    }
    for field in ["temperature", "top_p", "top_k", "metadata", "tool_choice"] {
        if let Some(value) = client_body.get(field) {
            if !value.is_null() {
                body[field] = value.clone();
            }
        }
    }
    if let Some(tools) = client_body.get("tools") {
        if !tools.is_null() {
            body["tools"] = normalise_tools(tools);
        }
    }

    let original_temperature = client_body.get("temperature").cloned();
    let thinking_enabled = variant.thinking.is_some();
    if let Some(thinking) = &variant.thinking {
        body["thinking"] = json!({
            "type": "enabled",
            "budget_tokens": thinking.budget_tokens,
        });
        // Upstream requires temperature 1 while thinking.
        body["temperature"] = json!(1);
    }

    PreparedRequest {
        body,
        stream,
        thinking_enabled,
        original_temperature,
    }
}

/// Convert OpenAI function-style tool definitions to the upstream shape;
/// tools already in upstream shape pass through untouched.
#[must_use]
pub fn normalise_tools(tools: &Value) -> Value {
    let Some(tools) = tools.as_array() else {
        return tools.clone();
    };

    let converted: Vec<Value> = tools
        .iter()
        .map(|tool| {
            let Some(function) = tool.get("function") else {
                return tool.clone();
            };
            let mut out = json!({
                "name": function.get("name").cloned().unwrap_or_default(),
                "input_schema": function
                    .get("parameters")
                    .cloned()
                    .unwrap_or_else(|| json!({"type": "object"})),
            });
            if let Some(description) = function.get("description") {
                out["description"] = description.clone();
            }
            out
        })
        .collect();
    Value::Array(converted)
}

/// Silent thinking downgrade: drop the thinking parameter and restore the
/// client's temperature. The interleaved-thinking beta disappears with
/// `thinking_enabled`.
pub fn downgrade_thinking(prepared: &mut PreparedRequest) {
    if let Some(obj) = prepared.body.as_object_mut() {
        let _ = obj.remove("thinking");
        match prepared.original_temperature.take() {
            Some(temperature) => {
                let _ = obj.insert("temperature".to_string(), temperature);
            }
            None => {
                let _ = obj.remove("temperature");
            }
        }
    }
    prepared.thinking_enabled = false;
}

/// Flatten message content (string or text blocks) to plain text.
fn flatten_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BYOK probe bypass
// ─────────────────────────────────────────────────────────────────────────────

/// Whether the body is an IDE key-check probe.
///
/// Probes are a single user message with a fixed verification prompt.
#[must_use]
pub fn is_byok_probe(body: &Value) -> bool {
    let Some(messages) = body.get("messages").and_then(Value::as_array) else {
        return false;
    };
    if messages.len() != 1 {
        return false;
    }
    let message = &messages[0];
    if message.get("role").and_then(Value::as_str) != Some("user") {
        return false;
    }

    let text = flatten_text(message.get("content").unwrap_or(&Value::Null));
    let text = text.trim();
    text.eq_ignore_ascii_case("Test prompt using gpt-3.5-turbo")
        || text.starts_with("Testing. Just say hi")
}

/// Canned success reply for a key-check probe.
#[must_use]
pub fn byok_response(stream: bool, model: &str) -> Response {
    let created = chrono::Utc::now().timestamp();
    if !stream {
        let completion = ChatCompletion {
            id: "chatcmpl-bypass".to_string(),
            object: COMPLETION_OBJECT.to_string(),
            created,
            model: model.to_string(),
            choices: vec![CompletionChoice {
                index: 0,
                message: CompletionMessage {
                    role: "assistant".to_string(),
                    content: Some(BYOK_REPLY.to_string()),
                    tool_calls: None,
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: Usage::from_counts(0, 0, 0),
        };
        return Json(completion).into_response();
    }

    let chunk = |delta: Delta, finish: Option<&str>| ChatCompletionChunk {
        id: "chatcmpl-bypass".to_string(),
        object: CHUNK_OBJECT.to_string(),
        created,
        model: model.to_string(),
        choices: vec![ChunkChoice {
            index: 0,
            delta,
            finish_reason: finish.map(ToString::to_string),
        }],
        usage: None,
    };

    let frames = [
        chunk(
            Delta {
                role: Some("assistant".to_string()),
                content: Some(String::new()),
                tool_calls: None,
            },
            None,
        ),
        chunk(
            Delta {
                role: None,
                content: Some(BYOK_REPLY.to_string()),
                tool_calls: None,
            },
            None,
        ),
        chunk(Delta::default(), Some("stop")),
    ];

    let mut body = String::new();
    for frame in &frames {
        if let Ok(json) = serde_json::to_string(frame) {
            body.push_str(&format!("data: {json}\n\n"));
        }
    }
    body.push_str("data: [DONE]\n\n");

    Response::builder()
        .status(axum::http::StatusCode::OK)
        .header("content-type", "text/event-stream")
        .body(Body::from(body))
        .unwrap_or_else(|_| axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

// ─────────────────────────────────────────────────────────────────────────────
// Response handling
// ─────────────────────────────────────────────────────────────────────────────

/// Upstream headers never forwarded to the client.
const DROPPED_RESPONSE_HEADERS: [&str; 3] =
    ["content-encoding", "content-length", "transfer-encoding"];

/// Build the streaming response: translated chunks or raw passthrough.
///
/// When the client disconnects the body stream is dropped, which drops the
/// upstream reader; a partial stream never reaches the cache write.
fn stream_response(
    state: &AppState,
    upstream: reqwest::Response,
    original_model: String,
    translate: bool,
) -> Response {
    let mut builder = Response::builder().status(axum::http::StatusCode::OK);
    for (name, value) in upstream.headers() {
        if DROPPED_RESPONSE_HEADERS.contains(&name.as_str()) {
            continue;
        }
        // The translated body gets its own content type below.
        if translate && *name == axum::http::header::CONTENT_TYPE {
            continue;
        }
        builder = builder.header(name, value);
    }

    if !translate {
        let passthrough = upstream.bytes_stream();
        return builder
            .body(Body::from_stream(passthrough))
            .unwrap_or_else(|_| axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response());
    }

    let cache = state.cache.clone();
    builder = builder.header("content-type", "text/event-stream");

    let body_stream = async_stream::stream! {
        let mut translator = StreamTranslator::new(original_model);
        let mut bytes_stream = upstream.bytes_stream();

        while let Some(next) = bytes_stream.next().await {
            match next {
                Ok(bytes) => {
                    for item in translator.push(&bytes) {
                        match item {
                            StreamItem::Chunk(chunk) => match serde_json::to_string(&chunk) {
                                Ok(json) => {
                                    yield Ok::<Bytes, std::io::Error>(Bytes::from(format!(
                                        "data: {json}\n\n"
                                    )));
                                }
                                Err(e) => tracing::warn!("chunk serialization failed: {e}"),
                            },
                            StreamItem::Done => {
                                yield Ok(Bytes::from_static(b"data: [DONE]\n\n"));
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("upstream stream read failed: {e}");
                    break;
                }
            }
        }

        // Fire-and-forget cache write, only after a clean end.
        if let Some((content, block)) = translator.cache_payload() {
            let cache = cache.clone();
            let _ = tokio::spawn(async move {
                cache.store(&content, block).await;
            });
        }
    };

    builder
        .body(Body::from_stream(body_stream))
        .unwrap_or_else(|_| axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Cache the thinking block of a non-streaming response, if it carries one.
fn cache_from_response(state: &AppState, upstream_body: &Value) {
    let Some(content) = upstream_body.get("content").and_then(Value::as_array) else {
        return;
    };
    let Some(block) = content.iter().find_map(|b| {
        if b.get("type").and_then(Value::as_str) != Some("thinking") {
            return None;
        }
        let signature = b.get("signature").and_then(Value::as_str)?;
        if signature.is_empty() {
            return None;
        }
        let thinking = b.get("thinking").and_then(Value::as_str).unwrap_or_default();
        Some(ThinkingBlock::new(thinking, signature))
    }) else {
        return;
    };

    let cache: std::sync::Arc<ThinkingCache> = state.cache.clone();
    let content = Value::Array(content.clone());
    let _ = tokio::spawn(async move {
        cache.store(&content, block).await;
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
