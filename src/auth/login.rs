//! Usage: Browser login orchestration (listener -> consent page -> callback -> code exchange).

use crate::auth::callback_server::{self, PORT_ATTEMPTS};
use crate::auth::pkce;
use crate::auth::session::{self, AuthSession};
use crate::infra::credentials::parse_redirect_uri;
use crate::shared::error::{AppError, AppResult, CODE_AUTH_REQUIRED};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum LoginStep {
    WaitingCallback,
    Exchanging,
    Done,
    Error,
}

/// Payload of the `auth:progress` event.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AuthProgress {
    pub step: LoginStep,
    pub message: Option<String>,
    pub authorize_url: Option<String>,
}

impl AuthProgress {
    fn step(step: LoginStep) -> Self {
        Self {
            step,
            message: None,
            authorize_url: None,
        }
    }
}

pub(crate) async fn run_login_flow(
    session: &AuthSession,
    open_browser: impl FnOnce(&str) -> AppResult<()>,
    progress: impl Fn(AuthProgress),
    timeout: Duration,
) -> AppResult<()> {
    let result = login_inner(session, open_browser, &progress, timeout).await;
    if let Err(err) = &result {
        tracing::warn!("spotify login failed: {}", err);
        progress(AuthProgress {
            step: LoginStep::Error,
            message: Some(err.to_string()),
            authorize_url: None,
        });
    }
    result
}

async fn login_inner(
    session: &AuthSession,
    open_browser: impl FnOnce(&str) -> AppResult<()>,
    progress: &impl Fn(AuthProgress),
    timeout: Duration,
) -> AppResult<()> {
    let credentials = session.credentials().await;
    let auth = session::client_auth(&credentials)?;
    let target = parse_redirect_uri(credentials.redirect_uri_or_default())?;

    let listener =
        callback_server::bind_callback_listener(&target.host, target.port, PORT_ATTEMPTS).await?;
    let redirect_uri = target.uri_with_port(listener.port());

    let pkce_pair = auth.is_public().then(pkce::generate_pkce_pair);
    let state = pkce::generate_state();
    let authorize_url = session::build_authorize_url(
        session.endpoints(),
        &credentials.client_id,
        &redirect_uri,
        &state,
        pkce_pair.as_ref().map(|p| p.code_challenge.as_str()),
    )?;

    progress(AuthProgress {
        step: LoginStep::WaitingCallback,
        message: None,
        authorize_url: Some(authorize_url.clone()),
    });
    tracing::info!(redirect_uri = %redirect_uri, "waiting for spotify login callback");
    if let Err(err) = open_browser(&authorize_url) {
        // The consent URL stays available through the progress event.
        tracing::warn!("failed to open browser for spotify login: {}", err);
    }

    let payload =
        callback_server::wait_for_callback(listener, &state, &target.path, timeout).await?;
    if let Some(error) = payload.error {
        let detail = payload.error_description.unwrap_or_default();
        return Err(AppError::new(
            CODE_AUTH_REQUIRED,
            format!("Spotify authorization was not granted: {error} {detail}")
                .trim()
                .to_string(),
        ));
    }
    let code = payload
        .code
        .ok_or_else(|| "SYSTEM_ERROR: oauth callback missing code".to_string())?;

    progress(AuthProgress::step(LoginStep::Exchanging));
    session
        .complete_login(
            &code,
            &redirect_uri,
            pkce_pair.as_ref().map(|p| p.code_verifier.as_str()),
        )
        .await?;

    progress(AuthProgress::step(LoginStep::Done));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::endpoints::SpotifyEndpoints;
    use crate::auth::session::tests::{spawn_token_server, test_credentials, MemorySink};
    use crate::shared::mutex_ext::MutexExt;
    use reqwest::Url;
    use std::sync::{Arc, Mutex};

    fn session_on_ephemeral_port(base: &str) -> AuthSession {
        let mut credentials = test_credentials();
        credentials.redirect_uri = "http://127.0.0.1:0/callback".to_string();
        AuthSession::new(
            reqwest::Client::new(),
            SpotifyEndpoints::local(base),
            credentials,
            None,
            Arc::new(MemorySink::default()),
        )
    }

    /// Plays the browser: follows the consent URL straight to the redirect with `query`.
    fn fake_browser(query: impl Fn(&str) -> String + Send + 'static) -> impl FnOnce(&str) -> AppResult<()> {
        move |authorize_url: &str| {
            let parsed = Url::parse(authorize_url).map_err(|e| e.to_string())?;
            let pairs: std::collections::HashMap<String, String> =
                parsed.query_pairs().into_owned().collect();
            let redirect = pairs["redirect_uri"].clone();
            let callback = format!("{redirect}?{}", query(&pairs["state"]));
            tokio::spawn(async move {
                let _ = reqwest::get(callback).await;
            });
            Ok(())
        }
    }

    #[tokio::test]
    async fn login_flow_exchanges_code_and_reports_steps() {
        let (base, _) = spawn_token_server().await;
        let session = session_on_ephemeral_port(&base);
        let steps = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&steps);
        run_login_flow(
            &session,
            fake_browser(|state| format!("code=abc&state={state}")),
            move |p| recorded.lock_or_recover().push(p.step),
            Duration::from_secs(10),
        )
        .await
        .expect("login");

        assert!(session.is_authenticated());
        assert_eq!(
            *steps.lock_or_recover(),
            vec![LoginStep::WaitingCallback, LoginStep::Exchanging, LoginStep::Done]
        );
    }

    #[tokio::test]
    async fn denied_consent_is_reported_as_error() {
        let (base, _) = spawn_token_server().await;
        let session = session_on_ephemeral_port(&base);
        let steps = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&steps);
        let err = run_login_flow(
            &session,
            fake_browser(|state| format!("error=access_denied&state={state}")),
            move |p| recorded.lock_or_recover().push(p.step),
            Duration::from_secs(10),
        )
        .await
        .expect_err("denied");

        assert_eq!(err.code(), CODE_AUTH_REQUIRED);
        assert!(err.message().contains("access_denied"));
        assert_eq!(steps.lock_or_recover().last(), Some(&LoginStep::Error));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn forged_state_is_rejected() {
        let (base, _) = spawn_token_server().await;
        let session = session_on_ephemeral_port(&base);
        let err = run_login_flow(
            &session,
            fake_browser(|_| "code=abc&state=forged".to_string()),
            |_| {},
            Duration::from_secs(10),
        )
        .await
        .expect_err("state mismatch");
        assert_eq!(err.code(), "SEC_INVALID_INPUT");
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_binding() {
        let session = AuthSession::new(
            reqwest::Client::new(),
            SpotifyEndpoints::default(),
            Default::default(),
            None,
            Arc::new(MemorySink::default()),
        );
        let err = run_login_flow(&session, |_| Ok(()), |_| {}, Duration::from_secs(1))
            .await
            .expect_err("no credentials");
        assert_eq!(err.code(), "CONFIG_MISSING");
    }
}
