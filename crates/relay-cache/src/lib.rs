//! # relay-cache
//!
//! Two-tier cache for signed extended-thinking blocks.
//!
//! The upstream requires that when thinking is enabled, every prior assistant
//! message carries its original signed thinking block verbatim. Clients
//! routinely strip those blocks from history; this cache re-attaches them.
//!
//! - [`key`] — content-derived keys that ignore thinking blocks, so a message
//!   hashes the same before and after the client strips them
//! - [`local`] — in-process bounded map, oldest-entry eviction
//! - [`remote`] — persistent REST key-value tier with per-entry TTL
//! - [`cache`] — read-through façade and history injection
//!
//! The persistent tier is optional: without it the cache degrades to
//! local-only and the proxy stays functional.

#![deny(unsafe_code)]

pub mod cache;
pub mod errors;
pub mod key;
pub mod local;
pub mod remote;

pub use cache::{InjectionReport, ThinkingCache};
pub use errors::CacheError;
pub use key::content_key;
pub use local::{DEFAULT_LOCAL_CAP, LocalTier};
pub use remote::{PersistentTier, ThinkingCacheEntry, UpstashTier};
