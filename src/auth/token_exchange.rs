//! Usage: Spotify token endpoint helpers (authorization_code, refresh_token and client_credentials grants).

use crate::shared::error::AppResult;
use crate::shared::security::sanitize_body_snippet;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use std::collections::HashMap;

/// Seconds subtracted from `expires_in` so a token is refreshed before Spotify rejects it.
pub(crate) const EXPIRY_SAFETY_BUFFER_SECS: i64 = 60;
// Spotify always reports `expires_in`; this covers proxies that strip it.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;
const ERROR_BODY_SNIPPET_CHARS: usize = 500;

/// How the client authenticates against the token endpoint.
#[derive(Clone)]
pub(crate) enum ClientAuth {
    /// Confidential client: `Authorization: Basic base64(id:secret)`.
    Basic { client_id: String, client_secret: String },
    /// Public client: `client_id` in the form body, PKCE verifier on code exchange.
    Public { client_id: String },
}

impl std::fmt::Debug for ClientAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic { client_id, .. } => f
                .debug_struct("Basic")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Self::Public { client_id } => f
                .debug_struct("Public")
                .field("client_id", client_id)
                .finish(),
        }
    }
}

impl ClientAuth {
    pub(crate) fn new(client_id: &str, client_secret: Option<&str>) -> Self {
        let client_id = client_id.trim().to_string();
        match client_secret.map(str::trim).filter(|s| !s.is_empty()) {
            Some(secret) => Self::Basic {
                client_id,
                client_secret: secret.to_string(),
            },
            None => Self::Public { client_id },
        }
    }

    pub(crate) fn is_public(&self) -> bool {
        matches!(self, Self::Public { .. })
    }

    fn apply(
        &self,
        builder: reqwest::RequestBuilder,
        form: &mut HashMap<&'static str, String>,
    ) -> reqwest::RequestBuilder {
        match self {
            Self::Basic {
                client_id,
                client_secret,
            } => {
                let encoded = STANDARD.encode(format!("{client_id}:{client_secret}"));
                builder.header(reqwest::header::AUTHORIZATION, format!("Basic {encoded}"))
            }
            Self::Public { client_id } => {
                form.insert("client_id", client_id.clone());
                builder
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant {
    AuthorizationCode,
    RefreshToken,
    ClientCredentials,
}

impl Grant {
    fn label(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "token exchange",
            Self::RefreshToken => "token refresh",
            Self::ClientCredentials => "credential check",
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub(crate) struct OAuthTokenSet {
    pub(crate) access_token: String,
    pub(crate) refresh_token: Option<String>,
    pub(crate) expires_at: i64,
}

impl std::fmt::Debug for OAuthTokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokenSet")
            .field("expires_at", &self.expires_at)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

pub(crate) async fn exchange_authorization_code(
    client: &reqwest::Client,
    token_url: &str,
    auth: &ClientAuth,
    code: &str,
    redirect_uri: &str,
    code_verifier: Option<&str>,
) -> AppResult<OAuthTokenSet> {
    let mut form: HashMap<&'static str, String> = HashMap::new();
    form.insert("grant_type", "authorization_code".to_string());
    form.insert("code", code.trim().to_string());
    form.insert("redirect_uri", redirect_uri.trim().to_string());
    if let Some(verifier) = code_verifier.map(str::trim).filter(|v| !v.is_empty()) {
        form.insert("code_verifier", verifier.to_string());
    }
    send_token_request(client, token_url, auth, form, Grant::AuthorizationCode).await
}

pub(crate) async fn refresh_access_token(
    client: &reqwest::Client,
    token_url: &str,
    auth: &ClientAuth,
    refresh_token: &str,
) -> AppResult<OAuthTokenSet> {
    let mut form: HashMap<&'static str, String> = HashMap::new();
    form.insert("grant_type", "refresh_token".to_string());
    form.insert("refresh_token", refresh_token.trim().to_string());
    send_token_request(client, token_url, auth, form, Grant::RefreshToken).await
}

/// Used by the setup wizard to check an id/secret pair without a browser round trip.
pub(crate) async fn request_client_credentials(
    client: &reqwest::Client,
    token_url: &str,
    auth: &ClientAuth,
) -> AppResult<OAuthTokenSet> {
    let mut form: HashMap<&'static str, String> = HashMap::new();
    form.insert("grant_type", "client_credentials".to_string());
    send_token_request(client, token_url, auth, form, Grant::ClientCredentials).await
}

async fn send_token_request(
    client: &reqwest::Client,
    token_url: &str,
    auth: &ClientAuth,
    mut form: HashMap<&'static str, String>,
    grant: Grant,
) -> AppResult<OAuthTokenSet> {
    let builder = auth.apply(client.post(token_url.trim()), &mut form);
    let response = builder
        .form(&form)
        .send()
        .await
        .map_err(|e| format!("SYSTEM_ERROR: spotify {} request failed: {e}", grant.label()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| format!("SYSTEM_ERROR: spotify {} response read failed: {e}", grant.label()))?;

    if !status.is_success() {
        return Err(classify_token_error(status.as_u16(), &body, grant).into());
    }
    parse_token_body(&body, crate::shared::time::now_unix_seconds())
}

fn classify_token_error(status: u16, body: &str, grant: Grant) -> String {
    let (error_code, error_message) = parse_oauth_error_details(body);

    if matches!(status, 400 | 401) && error_code.as_deref() == Some("invalid_client") {
        return format!(
            "AUTH_INVALID_CREDENTIALS: Spotify rejected the client ID or secret ({})",
            error_message.as_deref().unwrap_or("invalid_client")
        );
    }
    if grant == Grant::RefreshToken && error_code.as_deref() == Some("invalid_grant") {
        return "AUTH_RELOGIN_REQUIRED: Spotify refresh token was revoked or expired; please log in again"
            .to_string();
    }

    let mut msg = format!(
        "SYSTEM_ERROR: spotify {} returned status={status}",
        grant.label()
    );
    if let Some(code) = error_code {
        msg.push_str(" code=");
        msg.push_str(code.as_str());
    }
    if let Some(detail) = error_message {
        msg.push_str(" message=");
        msg.push_str(detail.chars().take(240).collect::<String>().as_str());
    }
    msg.push_str(" body=");
    msg.push_str(sanitize_body_snippet(body, ERROR_BODY_SNIPPET_CHARS).as_str());
    msg
}

pub(crate) fn parse_token_body(body: &str, now_unix: i64) -> AppResult<OAuthTokenSet> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| format!("SYSTEM_ERROR: spotify token response json invalid: {e}"))?;

    let access_token = value
        .get("access_token")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| "SYSTEM_ERROR: spotify token response missing access_token".to_string())?
        .to_string();

    let refresh_token = value
        .get("refresh_token")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let expires_in = value
        .get("expires_in")
        .and_then(parse_i64_lossy)
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_EXPIRES_IN_SECS);

    Ok(OAuthTokenSet {
        access_token,
        refresh_token,
        expires_at: now_unix
            .saturating_add(expires_in)
            .saturating_sub(EXPIRY_SAFETY_BUFFER_SECS),
    })
}

fn parse_i64_lossy(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn parse_oauth_error_details(body: &str) -> (Option<String>, Option<String>) {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return (None, None),
    };

    let non_empty = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let mut code = None;
    let mut message = non_empty(value.get("error_description"));

    match value.get("error") {
        Some(Value::String(err)) => code = Some(err.trim().to_string()),
        // Web API style: {"error": {"status": 400, "message": "..."}}
        Some(Value::Object(err_obj)) => {
            if message.is_none() {
                message = non_empty(err_obj.get("message"));
            }
        }
        _ => {}
    }

    (code, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::security::mask_token;

    #[test]
    fn token_body_applies_expiry_buffer() {
        let body = r#"{"access_token":"at","token_type":"Bearer","expires_in":3600,"refresh_token":"rt"}"#;
        let set = parse_token_body(body, 1_000).expect("parse");
        assert_eq!(set.access_token, "at");
        assert_eq!(set.refresh_token.as_deref(), Some("rt"));
        assert_eq!(set.expires_at, 1_000 + 3600 - 60);
    }

    #[test]
    fn token_body_accepts_string_expires_in_and_missing_refresh_token() {
        let set = parse_token_body(r#"{"access_token":"at","expires_in":"120"}"#, 0).expect("parse");
        assert_eq!(set.expires_at, 60);
        assert!(set.refresh_token.is_none());
    }

    #[test]
    fn token_body_requires_access_token() {
        let err = parse_token_body(r#"{"expires_in":3600}"#, 0).expect_err("missing");
        assert!(err.message().contains("access_token"));
    }

    #[test]
    fn invalid_client_maps_to_invalid_credentials() {
        let body = r#"{"error":"invalid_client","error_description":"Invalid client secret"}"#;
        for grant in [Grant::AuthorizationCode, Grant::RefreshToken, Grant::ClientCredentials] {
            let mapped = classify_token_error(400, body, grant);
            assert!(mapped.starts_with("AUTH_INVALID_CREDENTIALS:"), "{mapped}");
            assert!(mapped.contains("Invalid client secret"));
        }
    }

    #[test]
    fn invalid_grant_requires_relogin_only_on_refresh() {
        let body = r#"{"error":"invalid_grant","error_description":"Refresh token revoked"}"#;
        assert!(classify_token_error(400, body, Grant::RefreshToken)
            .starts_with("AUTH_RELOGIN_REQUIRED:"));
        let exchange = classify_token_error(400, body, Grant::AuthorizationCode);
        assert!(exchange.starts_with("SYSTEM_ERROR:"));
        assert!(exchange.contains("code=invalid_grant"));
    }

    #[test]
    fn generic_errors_carry_redacted_snippet() {
        let body = r#"{"error":"server_error","refresh_token":"AQDsecretvalue12345"}"#;
        let msg = classify_token_error(500, body, Grant::RefreshToken);
        assert!(msg.contains("status=500"));
        assert!(msg.contains(mask_token("AQDsecretvalue12345").as_str()));
        assert!(!msg.contains("AQDsecretvalue12345"));
    }

    #[test]
    fn client_auth_without_secret_is_public() {
        assert!(ClientAuth::new("id", None).is_public());
        assert!(ClientAuth::new("id", Some("  ")).is_public());
        assert!(!ClientAuth::new("id", Some("secret")).is_public());
        assert!(!format!("{:?}", ClientAuth::new("id", Some("supersecret"))).contains("supersecret"));
    }

    #[tokio::test]
    async fn confidential_client_sends_basic_auth() {
        use axum::{http::HeaderMap, routing::post, Router};

        let app = Router::new().route(
            "/api/token",
            post(|headers: HeaderMap, body: String| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let expected = format!("Basic {}", STANDARD.encode("id:secret"));
                if auth == expected && body.contains("grant_type=client_credentials") {
                    (
                        axum::http::StatusCode::OK,
                        r#"{"access_token":"app-token","expires_in":3600}"#.to_string(),
                    )
                } else {
                    (
                        axum::http::StatusCode::BAD_REQUEST,
                        r#"{"error":"invalid_client"}"#.to_string(),
                    )
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let http = reqwest::Client::new();
        let url = format!("http://{addr}/api/token");
        let ok = request_client_credentials(&http, &url, &ClientAuth::new("id", Some("secret")))
            .await
            .expect("valid credentials");
        assert_eq!(ok.access_token, "app-token");

        let err = request_client_credentials(&http, &url, &ClientAuth::new("id", Some("wrong")))
            .await
            .expect_err("bad secret");
        assert_eq!(err.code(), "AUTH_INVALID_CREDENTIALS");
    }
}
