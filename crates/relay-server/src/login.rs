//! Interactive OAuth login endpoints and the embedded login page.
//!
//! The console displays the authorization code as `code#state` after the
//! user approves; since the PKCE verifier rides along as `state`, the pasted
//! value is self-contained and the callback works even if the in-process
//! session was lost (say, across a restart).

use axum::Json;
use axum::extract::State;
use axum::response::Html;
use serde::Deserialize;
use serde_json::{Value, json};

use relay_auth::generate_pkce;
use relay_core::now_ms;

use crate::errors::ProxyError;
use crate::state::{AppState, LoginSession};

/// Pending sessions older than this are pruned.
const SESSION_MAX_AGE_MS: i64 = 10 * 60 * 1000;

/// The login UI.
pub const LOGIN_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>claude-relay</title>
  <style>
    body { font-family: system-ui, sans-serif; max-width: 40rem; margin: 4rem auto; padding: 0 1rem; color: #222; }
    h1 { font-size: 1.4rem; }
    button { padding: 0.5rem 1rem; cursor: pointer; }
    input { width: 100%; padding: 0.5rem; margin: 0.5rem 0; box-sizing: border-box; }
    #status { margin-top: 1rem; white-space: pre-wrap; }
    .ok { color: #1a7f37; }
    .err { color: #b42318; }
  </style>
</head>
<body>
  <h1>claude-relay</h1>
  <p>Authenticate this proxy against the Anthropic developer console.</p>
  <button id="start">1. Open login page</button>
  <p>After approving, paste the full code shown by the console (it looks like <code>code#verifier</code>):</p>
  <input id="code" placeholder="code#verifier">
  <button id="finish">2. Complete login</button>
  <div id="status"></div>
  <script>
    const status = (msg, ok) => {
      const el = document.getElementById('status');
      el.textContent = msg;
      el.className = ok ? 'ok' : 'err';
    };
    document.getElementById('start').onclick = async () => {
      const resp = await fetch('/auth/oauth/start', { method: 'POST' });
      const data = await resp.json();
      if (data.success) { window.open(data.authUrl, '_blank'); status('Login page opened.', true); }
      else { status('Failed to start login.', false); }
    };
    document.getElementById('finish').onclick = async () => {
      const code = document.getElementById('code').value.trim();
      const resp = await fetch('/auth/oauth/callback', {
        method: 'POST',
        headers: { 'content-type': 'application/json' },
        body: JSON.stringify({ code }),
      });
      const data = await resp.json();
      if (resp.ok && data.success) { status('Authenticated. The proxy is ready.', true); }
      else { status('Login failed: ' + JSON.stringify(data), false); }
    };
  </script>
</body>
</html>
"#;

/// GET `/` and `/index.html`.
pub async fn serve_login_page() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

/// POST `/auth/oauth/start`.
pub async fn oauth_start(State(state): State<AppState>) -> Json<Value> {
    let pkce = generate_pkce();
    let auth_url = state
        .oauth
        .authorization_url(&pkce.challenge, &pkce.verifier);
    let session_id = uuid::Uuid::now_v7().to_string();

    let mut sessions = state.sessions.lock();
    let now = now_ms();
    sessions.retain(|_, s| now - s.created_at < SESSION_MAX_AGE_MS);
    let _ = sessions.insert(
        session_id.clone(),
        LoginSession {
            verifier: pkce.verifier,
            created_at: now,
        },
    );

    Json(json!({
        "success": true,
        "authUrl": auth_url,
        "sessionId": session_id,
    }))
}

/// POST `/auth/login/start` — headless variant of the same flow.
pub async fn login_start(State(state): State<AppState>) -> Json<Value> {
    let pkce = generate_pkce();
    let auth_url = state
        .oauth
        .authorization_url(&pkce.challenge, &pkce.verifier);

    Json(json!({
        "success": true,
        "authUrl": auth_url,
        "instructions": "Open the URL, approve, then POST the displayed code to /auth/oauth/callback.",
    }))
}

/// Callback request body.
#[derive(Debug, Deserialize)]
pub struct CallbackBody {
    /// `code#verifier` as displayed by the console.
    pub code: Option<String>,
}

/// POST `/auth/oauth/callback`.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Json(body): Json<CallbackBody>,
) -> Result<Json<Value>, ProxyError> {
    let raw = body
        .code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ProxyError::BadRequest("missing 'code'".to_string()))?;

    let (code, verifier) = raw.split_once('#').ok_or_else(|| {
        ProxyError::BadRequest("code must include the verifier after '#'".to_string())
    })?;
    if code.is_empty() || verifier.is_empty() {
        return Err(ProxyError::BadRequest(
            "code must include the verifier after '#'".to_string(),
        ));
    }

    state
        .oauth
        .exchange_code(code, verifier)
        .await
        .map_err(|e| ProxyError::Internal(format!("token exchange failed: {e}")))?;

    tracing::info!("login complete, credential stored");
    Ok(Json(json!({ "success": true })))
}

/// GET `/auth/logout`.
pub async fn logout(State(state): State<AppState>) -> Result<Json<Value>, ProxyError> {
    state
        .oauth
        .logout()
        .await
        .map_err(|e| ProxyError::Internal(e.to_string()))?;
    Ok(Json(json!({ "success": true })))
}

/// GET `/auth/status`.
pub async fn auth_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "authenticated": state.oauth.is_authenticated().await }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
