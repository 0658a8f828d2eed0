//! Usage: Spotify login / logout commands.

use crate::app::app_state::SpotifyState;
use crate::app::{login_task, poller};
use crate::spotify::now_playing::NowPlayingView;
use tauri::Emitter;

#[derive(Debug, Clone, serde::Serialize, specta::Type)]
pub(crate) struct AuthStatus {
    authenticated: bool,
    login_in_progress: bool,
    credentials_complete: bool,
}

#[tauri::command]
#[specta::specta]
pub(crate) async fn auth_status(state: tauri::State<'_, SpotifyState>) -> Result<AuthStatus, String> {
    let creds = state.session().credentials().await;
    Ok(AuthStatus {
        authenticated: state.session().is_authenticated(),
        login_in_progress: state.login_in_progress(),
        credentials_complete: creds.is_complete(),
    })
}

/// Opens the consent page and waits for the callback; progress is streamed as `auth:progress`.
#[tauri::command]
#[specta::specta]
pub(crate) async fn auth_login(app: tauri::AppHandle) -> Result<bool, String> {
    login_task::login(&app).await?;
    Ok(true)
}

#[tauri::command]
#[specta::specta]
pub(crate) async fn auth_logout(
    app: tauri::AppHandle,
    state: tauri::State<'_, SpotifyState>,
) -> Result<bool, String> {
    state.session().logout().await?;
    let _ = app.emit(poller::EVENT_PLAYBACK_STATE, NowPlayingView::idle());
    Ok(true)
}
