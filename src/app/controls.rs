//! Usage: Playback actions shared by hotkeys, tray and commands (run, then schedule a refresh).

use crate::app::overlay::{self, PanelKind};
use crate::app::shortcuts::ShortcutAction;
use crate::app::{app_state, poller};
use crate::shared::error::AppResult;
use crate::spotify::client::SpotifyClient;
use crate::{blocking, settings};
use std::future::Future;
use std::time::Duration;
use tauri::Runtime;

async fn post_command_delay<R: Runtime>(app: &tauri::AppHandle<R>) -> Duration {
    let app = app.clone();
    let ms = blocking::run("controls_read_settings", move || settings::read(&app))
        .await
        .map(|cfg| cfg.post_command_refresh_delay_ms)
        .unwrap_or(settings::DEFAULT_POST_COMMAND_REFRESH_DELAY_MS);
    Duration::from_millis(u64::from(ms))
}

/// Runs a player command and wakes the poller shortly after it succeeds.
pub(crate) async fn run_command<R, T, F, Fut>(
    app: &tauri::AppHandle<R>,
    label: &'static str,
    f: F,
) -> AppResult<T>
where
    R: Runtime,
    F: FnOnce(SpotifyClient) -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let client = app_state::spotify_client(app)?;
    let result = f(client).await;
    match &result {
        Ok(_) => {
            tracing::debug!(command = label, "player command sent");
            poller::request_refresh(app, post_command_delay(app).await);
        }
        Err(err) => tracing::warn!(command = label, code = err.code(), "player command failed: {}", err),
    }
    result
}

pub(crate) async fn toggle_playback<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<bool> {
    run_command(app, "toggle_playback", |client| async move { client.toggle_playback().await }).await
}

pub(crate) async fn next_track<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<()> {
    run_command(app, "next_track", |client| async move { client.next_track().await }).await
}

pub(crate) async fn previous_track<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<()> {
    run_command(app, "previous_track", |client| async move { client.previous_track().await }).await
}

async fn run_action<R: Runtime>(app: &tauri::AppHandle<R>, action: ShortcutAction) -> AppResult<()> {
    match action {
        ShortcutAction::TogglePlayback => toggle_playback(app).await.map(|_| ()),
        ShortcutAction::NextTrack => next_track(app).await,
        ShortcutAction::PreviousTrack => previous_track(app).await,
        ShortcutAction::ShowQueue => overlay::panel_from_hotkey(app, PanelKind::Queue).map(|_| ()),
        ShortcutAction::ShowPlaylists => {
            overlay::panel_from_hotkey(app, PanelKind::Playlists).map(|_| ())
        }
    }
}

/// Fire-and-forget entry for hotkeys; failures surface through `playback:error`.
pub(crate) fn dispatch<R: Runtime>(app: &tauri::AppHandle<R>, action: ShortcutAction) {
    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        if let Err(err) = run_action(&app, action).await {
            poller::report_error(&app, &err);
        }
    });
}
