//! Upstream endpoint constants and request construction.
//!
//! OAuth traffic to the Messages API needs a specific header set: the beta
//! feature list, the first-party client identity, and the API version. The
//! interleaved-thinking beta rides along only while thinking is enabled.

use serde_json::Value;

/// Messages endpoint.
pub const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

/// Model catalogue endpoint.
pub const MODELS_URL: &str = "https://api.anthropic.com/v1/models";

/// API version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Betas sent on every messages call.
pub const BASE_BETAS: &str =
    "oauth-2025-04-20,fine-grained-tool-streaming-2025-05-14,prompt-caching-2024-07-31";

/// Beta appended while thinking is enabled.
pub const INTERLEAVED_THINKING_BETA: &str = "interleaved-thinking-2025-05-14";

/// Stable client identity.
pub const USER_AGENT: &str = "claude-cli/1.0.83 (external, cli)";

/// The `anthropic-beta` header value for a request.
#[must_use]
pub fn beta_header(thinking_enabled: bool) -> String {
    if thinking_enabled {
        format!("{BASE_BETAS},{INTERLEAVED_THINKING_BETA}")
    } else {
        BASE_BETAS.to_string()
    }
}

/// Build the Messages API request.
pub fn messages_request(
    http: &reqwest::Client,
    url: &str,
    token: &str,
    body: &Value,
    stream: bool,
    thinking_enabled: bool,
) -> reqwest::RequestBuilder {
    let accept = if stream {
        "text/event-stream"
    } else {
        "application/json"
    };

    http.post(url)
        .bearer_auth(token)
        .header("content-type", "application/json")
        .header("anthropic-version", ANTHROPIC_VERSION)
        .header("anthropic-beta", beta_header(thinking_enabled))
        .header("anthropic-dangerous-direct-browser-access", "true")
        .header("user-agent", USER_AGENT)
        .header("x-app", "cli")
        .header("accept", accept)
        .json(body)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_betas_cover_required_features() {
        assert!(BASE_BETAS.contains("oauth-2025-04-20"));
        assert!(BASE_BETAS.contains("fine-grained-tool-streaming-2025-05-14"));
        assert!(BASE_BETAS.contains("prompt-caching-2024-07-31"));
        assert!(!BASE_BETAS.contains("interleaved-thinking"));
    }

    #[test]
    fn thinking_appends_interleaved_beta() {
        let with = beta_header(true);
        assert!(with.starts_with(BASE_BETAS));
        assert!(with.ends_with(INTERLEAVED_THINKING_BETA));

        assert_eq!(beta_header(false), BASE_BETAS);
    }

    #[test]
    fn request_carries_required_headers() {
        let http = reqwest::Client::new();
        let body = serde_json::json!({"model": "claude-sonnet-4-5-20250929"});
        let req = messages_request(&http, MESSAGES_URL, "tok", &body, true, false)
            .build()
            .unwrap();

        let headers = req.headers();
        assert_eq!(headers["anthropic-version"], ANTHROPIC_VERSION);
        assert_eq!(headers["anthropic-beta"], BASE_BETAS);
        assert_eq!(headers["accept"], "text/event-stream");
        assert_eq!(headers["x-app"], "cli");
        assert!(
            headers["authorization"]
                .to_str()
                .unwrap()
                .starts_with("Bearer ")
        );
    }

    #[test]
    fn non_streaming_accepts_json() {
        let http = reqwest::Client::new();
        let req = messages_request(
            &http,
            MESSAGES_URL,
            "tok",
            &serde_json::json!({}),
            false,
            true,
        )
        .build()
        .unwrap();
        assert_eq!(req.headers()["accept"], "application/json");
        assert!(
            req.headers()["anthropic-beta"]
                .to_str()
                .unwrap()
                .contains(INTERLEAVED_THINKING_BETA)
        );
    }
}
