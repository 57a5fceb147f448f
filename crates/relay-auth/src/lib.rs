//! # relay-auth
//!
//! OAuth credential management for the upstream Messages API.
//!
//! - [`types`] — credential record and OAuth endpoint configuration
//! - [`store`] — pluggable persistence: local JSON file or remote REST KV
//! - [`oauth`] — token lifecycle: validity check, refresh, code exchange
//! - [`pkce`] — PKCE verifier/challenge generation for the login flow
//!
//! The credential store is the single source of truth: every
//! [`access_token`](oauth::OAuthManager::access_token) call re-reads it, and
//! refresh writes are last-writer-wins. Concurrent refreshes are tolerated —
//! the upstream accepts the second refresh and the store keeps whichever
//! write lands last.

#![deny(unsafe_code)]

pub mod errors;
pub mod oauth;
pub mod pkce;
pub mod store;
pub mod types;

pub use errors::AuthError;
pub use oauth::OAuthManager;
pub use pkce::{PkcePair, generate_pkce};
pub use store::{CredentialStore, FileCredentialStore, RestCredentialStore};
pub use types::{CREDENTIAL_KEY, OAuthConfig, OAuthCredential, default_config};
