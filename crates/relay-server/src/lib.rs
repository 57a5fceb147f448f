//! # relay-server
//!
//! The HTTP surface of the proxy and the request pipeline behind it.
//!
//! - [`config`] — environment-driven configuration
//! - [`state`] — shared app state: credential manager, thinking cache, HTTP client
//! - [`errors`] — the error taxonomy, shaped into HTTP responses
//! - [`pipeline`] — the chat path: gate → resolve → rewrite → inject → dispatch → translate
//! - [`upstream`] — upstream endpoint constants and header construction
//! - [`routes`] — router wiring
//! - [`login`] — interactive OAuth login endpoints and the embedded login page
//! - [`models`] — `/v1/models` catalogue with fetch-with-fallback
//! - [`server`] — bind/serve with graceful shutdown
//! - [`shutdown`] — cancellation-token coordination

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod login;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;
pub mod upstream;

pub use config::Config;
pub use errors::ProxyError;
pub use server::RelayServer;
pub use state::AppState;
