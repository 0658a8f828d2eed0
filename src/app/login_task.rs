//! Usage: Browser login wired to the app (opener plugin, `auth:progress` events, single-flight gate).

use crate::app::app_state::SpotifyState;
use crate::app::poller;
use crate::auth::callback_server::DEFAULT_CALLBACK_TIMEOUT;
use crate::auth::login::{self, AuthProgress};
use crate::shared::error::{AppError, AppResult, CODE_INVALID_INPUT, CODE_SYSTEM};
use std::time::Duration;
use tauri::{Emitter, Manager, Runtime};
use tauri_plugin_opener::OpenerExt;

pub(crate) const EVENT_AUTH_PROGRESS: &str = "auth:progress";

/// Runs one login to completion; a second concurrent call is rejected.
pub(crate) async fn login<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<()> {
    let state = app
        .try_state::<SpotifyState>()
        .ok_or_else(|| AppError::new(CODE_SYSTEM, "spotify state is not initialized"))?;
    let Some(_guard) = state.try_begin_login() else {
        return Err(AppError::new(
            CODE_INVALID_INPUT,
            "a Spotify login is already waiting for the browser",
        ));
    };

    let open_browser = |url: &str| {
        app.opener()
            .open_url(url, None::<&str>)
            .map_err(|e| AppError::new(CODE_SYSTEM, format!("failed to open browser: {e}")))
    };
    let progress = |event: AuthProgress| {
        let _ = app.emit(EVENT_AUTH_PROGRESS, event);
    };
    login::run_login_flow(state.session(), open_browser, progress, DEFAULT_CALLBACK_TIMEOUT).await?;

    tracing::info!("spotify login completed");
    poller::request_refresh(app, Duration::ZERO);
    Ok(())
}

/// Fire-and-forget login for startup and the tray menu.
pub(crate) fn spawn_login<R: Runtime>(app: &tauri::AppHandle<R>) {
    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        if let Err(err) = login(&app).await {
            tracing::warn!(code = err.code(), "background login did not complete: {}", err);
        }
    });
}
