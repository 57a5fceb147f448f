//! Bind and serve with graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes;
use crate::shutdown::ShutdownCoordinator;
use crate::state::AppState;

/// The relay HTTP server.
pub struct RelayServer {
    state: AppState,
    shutdown: Arc<ShutdownCoordinator>,
}

impl RelayServer {
    /// Create a server over prepared state.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            shutdown: Arc::new(ShutdownCoordinator::new()),
        }
    }

    /// Build the router.
    #[must_use]
    pub fn router(&self) -> Router {
        routes::router(self.state.clone())
    }

    /// Get the shutdown coordinator.
    #[must_use]
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Bind and start serving. Returns the bound address and a join handle
    /// for the serve task.
    #[instrument(skip_all, fields(host = %self.state.config.host, port = self.state.config.port))]
    pub async fn listen(
        &self,
    ) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), std::io::Error> {
        let addr = format!("{}:{}", self.state.config.host, self.state.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "relay listening");

        let router = self.router();
        let shutdown_token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_token.cancelled().await;
                    info!("server shutdown initiated");
                })
                .await;
            info!("server shutdown complete");
        });

        Ok((bound_addr, handle))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn make_server() -> RelayServer {
        let config = Config {
            port: 0,
            ..Config::default()
        };
        RelayServer::new(AppState::from_config(config).unwrap())
    }

    #[tokio::test]
    async fn v1_status_reports_service() {
        let app = make_server().router();
        let req = Request::builder().uri("/v1").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["service"], "claude-relay");
        assert_eq!(parsed["thinking_cache"]["persistent"], false);
    }

    #[tokio::test]
    async fn root_serves_login_page() {
        let app = make_server().router();
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("<!doctype html>"));
    }

    #[tokio::test]
    async fn get_on_chat_path_is_405() {
        let app = make_server().router();
        let req = Request::builder()
            .uri("/v1/chat/completions")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn unknown_route_lists_endpoints() {
        let app = make_server().router();
        let req = Request::builder()
            .uri("/nope")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(
            parsed["available_endpoints"]
                .as_array()
                .unwrap()
                .iter()
                .any(|e| e.as_str().unwrap().contains("/v1/chat/completions"))
        );
    }

    #[tokio::test]
    async fn non_claude_model_gets_selective_404() {
        let app = make_server().router();
        let body = serde_json::json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hello there"}],
        });
        let req = Request::builder()
            .method("POST")
            .uri("/v1/chat/completions")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["error"]["code"], "model_not_supported_by_proxy");
    }

    #[tokio::test]
    async fn byok_probe_bypasses_gateway() {
        let app = make_server().router();
        let body = serde_json::json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "Test prompt using gpt-3.5-turbo"}],
        });
        let req = Request::builder()
            .method("POST")
            .uri("/v1/chat/completions")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            parsed["choices"][0]["message"]["content"],
            "Connection successful!"
        );
    }

    #[tokio::test]
    async fn missing_credential_is_401() {
        // Claude model, no probe, no credential on disk → auth guidance.
        let dir = tempfile::TempDir::new().unwrap();
        let store = std::sync::Arc::new(relay_auth::FileCredentialStore::new(dir.path()));
        let mut state = AppState::from_config(Config::default()).unwrap();
        state.oauth = std::sync::Arc::new(relay_auth::OAuthManager::new(
            store,
            relay_auth::default_config(),
        ));
        let app = routes::router(state);

        let body = serde_json::json!({
            "model": "claude-4.5-sonnet",
            "messages": [{"role": "user", "content": "hello"}],
        });
        let req = Request::builder()
            .method("POST")
            .uri("/v1/chat/completions")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn api_key_gate_rejects_mismatch() {
        let config = Config {
            api_key: Some("sk-gate".into()),
            ..Config::default()
        };
        let app = RelayServer::new(AppState::from_config(config).unwrap()).router();

        let body = serde_json::json!({
            "model": "claude-4.5-sonnet",
            "messages": [{"role": "user", "content": "hello"}],
        });
        let req = Request::builder()
            .method("POST")
            .uri("/v1/chat/completions")
            .header("content-type", "application/json")
            .header("authorization", "Bearer wrong-key")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_status_defaults_false() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut state = AppState::from_config(Config::default()).unwrap();
        state.oauth = std::sync::Arc::new(relay_auth::OAuthManager::new(
            std::sync::Arc::new(relay_auth::FileCredentialStore::new(dir.path())),
            relay_auth::default_config(),
        ));
        let app = routes::router(state);

        let req = Request::builder()
            .uri("/auth/status")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let bytes = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["authenticated"], false);
    }

    #[tokio::test]
    async fn callback_without_verifier_is_400() {
        let app = make_server().router();
        let req = Request::builder()
            .method("POST")
            .uri("/auth/oauth/callback")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"code":"just-a-code-no-hash"}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oauth_start_returns_url_and_session() {
        let app = make_server().router();
        let req = Request::builder()
            .method("POST")
            .uri("/auth/oauth/start")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["success"], true);
        assert!(
            parsed["authUrl"]
                .as_str()
                .unwrap()
                .contains("code_challenge=")
        );
        assert!(!parsed["sessionId"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn listen_binds_and_shuts_down() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);

        server.shutdown().shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("shutdown timed out")
            .expect("join error");
    }
}
