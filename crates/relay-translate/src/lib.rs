//! # relay-translate
//!
//! The protocol seam of the proxy: everything that rewrites one wire format
//! into the other.
//!
//! - [`events`] — upstream Messages API SSE event structures
//! - [`openai`] — OpenAI chat-completion wire types (chunks and full objects)
//! - [`stream`] — the stateful event-stream → chunk-stream translator
//! - [`convert`] — stateless converter for non-streaming responses
//! - [`variants`] — client alias → upstream model/token-budget resolution
//! - [`context`] — observability-only request summarisation
//!
//! The stream translator is strictly per-request state: one instance per
//! upstream response, owned by the handler, never shared.

#![deny(unsafe_code)]

pub mod context;
pub mod convert;
pub mod errors;
pub mod events;
pub mod openai;
pub mod stream;
pub mod variants;

pub use convert::to_chat_completion;
pub use errors::TranslateError;
pub use openai::{ChatCompletion, ChatCompletionChunk, Usage};
pub use stream::{StreamItem, StreamTranslator};
pub use variants::{ModelVariant, ThinkingConfig, is_claude_family, resolve_variant};
