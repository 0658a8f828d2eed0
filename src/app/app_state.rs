//! Usage: Shared Tauri state (Spotify session + client, login gate) used by `commands/*`.

use crate::auth::endpoints::SpotifyEndpoints;
use crate::auth::session::AuthSession;
use crate::infra::{credentials, token_store};
use crate::shared::error::{AppError, AppResult, CODE_SYSTEM};
use crate::spotify::client::SpotifyClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tauri::{Manager, Runtime};

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) struct SpotifyState {
    client: SpotifyClient,
    login_in_progress: AtomicBool,
}

/// Held while a browser login runs; releases the gate on drop.
pub(crate) struct LoginGuard<'a>(&'a AtomicBool);

impl Drop for LoginGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SpotifyState {
    pub(crate) fn new(session: Arc<AuthSession>) -> Self {
        Self {
            client: SpotifyClient::new(session),
            login_in_progress: AtomicBool::new(false),
        }
    }

    pub(crate) fn client(&self) -> &SpotifyClient {
        &self.client
    }

    pub(crate) fn session(&self) -> &Arc<AuthSession> {
        self.client.session()
    }

    /// `None` when another login is already waiting for its callback.
    pub(crate) fn try_begin_login(&self) -> Option<LoginGuard<'_>> {
        self.login_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LoginGuard(&self.login_in_progress))
    }

    pub(crate) fn login_in_progress(&self) -> bool {
        self.login_in_progress.load(Ordering::Acquire)
    }
}

pub(crate) fn build_http_client() -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("spotify-overlay/", env!("CARGO_PKG_VERSION")))
        .timeout(HTTP_TIMEOUT)
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .build()
        .map_err(|e| AppError::new(CODE_SYSTEM, format!("failed to build http client: {e}")))
}

/// Loads credentials and stored tokens, then builds the session backed by the token file.
pub(crate) fn init<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<SpotifyState> {
    let creds = credentials::read(app)?;
    let tokens = token_store::load(app)?;
    let sink = token_store::FileTokenSink::for_app(app)?;
    tracing::info!(
        credentials_complete = creds.is_complete(),
        has_tokens = tokens.is_some(),
        "spotify session loaded"
    );
    let session = AuthSession::new(
        build_http_client()?,
        SpotifyEndpoints::default(),
        creds,
        tokens,
        Arc::new(sink),
    );
    Ok(SpotifyState::new(Arc::new(session)))
}

/// Client handle for background tasks; cheap to clone.
pub(crate) fn spotify_client<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<SpotifyClient> {
    app.try_state::<SpotifyState>()
        .map(|state| state.client().clone())
        .ok_or_else(|| AppError::new(CODE_SYSTEM, "spotify state is not initialized"))
}
