//! Usage: Playback, queue and playlist commands for the overlay and its panels.

use crate::app::app_state::SpotifyState;
use crate::app::controls;
use crate::app::overlay::{self, PanelKind};
use crate::spotify::now_playing::{NowPlayingView, PlaylistEntryView, QueueView};
use crate::{blocking, settings};

async fn list_limits(app: &tauri::AppHandle) -> settings::AppSettings {
    let app = app.clone();
    match blocking::run("playback_read_settings", move || settings::read(&app)).await {
        Ok(cfg) => cfg,
        Err(err) => {
            tracing::warn!("settings read failed, using defaults: {}", err);
            settings::AppSettings::default()
        }
    }
}

#[tauri::command]
#[specta::specta]
pub(crate) async fn playback_get(state: tauri::State<'_, SpotifyState>) -> Result<NowPlayingView, String> {
    if !state.session().is_authenticated() {
        return Ok(NowPlayingView::idle());
    }
    let playback = state.client().current_playback().await?;
    Ok(NowPlayingView::from_playback(playback.as_ref()))
}

/// Returns the `is_playing` value the toggle asked for.
#[tauri::command]
#[specta::specta]
pub(crate) async fn playback_toggle(app: tauri::AppHandle) -> Result<bool, String> {
    Ok(controls::toggle_playback(&app).await?)
}

#[tauri::command]
#[specta::specta]
pub(crate) async fn playback_next(app: tauri::AppHandle) -> Result<bool, String> {
    controls::next_track(&app).await?;
    Ok(true)
}

#[tauri::command]
#[specta::specta]
pub(crate) async fn playback_previous(app: tauri::AppHandle) -> Result<bool, String> {
    controls::previous_track(&app).await?;
    Ok(true)
}

#[tauri::command]
#[specta::specta]
pub(crate) async fn playback_set_volume(app: tauri::AppHandle, percent: u32) -> Result<u32, String> {
    let percent = percent.min(100);
    controls::run_command(&app, "set_volume", |client| async move {
        client.set_volume(percent).await
    })
    .await?;
    Ok(percent)
}

#[tauri::command]
#[specta::specta]
pub(crate) async fn queue_get(
    app: tauri::AppHandle,
    state: tauri::State<'_, SpotifyState>,
) -> Result<QueueView, String> {
    let limit = list_limits(&app).await.queue_display_limit;
    let queue = state.client().queue().await?;
    Ok(QueueView::from_queue(&queue, limit as usize))
}

#[tauri::command]
#[specta::specta]
pub(crate) async fn playlists_list(
    app: tauri::AppHandle,
    state: tauri::State<'_, SpotifyState>,
) -> Result<Vec<PlaylistEntryView>, String> {
    let limit = list_limits(&app).await.playlist_limit;
    let page = state.client().playlists(limit).await?;
    Ok(page.items.iter().map(PlaylistEntryView::from).collect())
}

/// Starts the playlist as the playback context and hides the playlist panel.
#[tauri::command]
#[specta::specta]
pub(crate) async fn playlist_play(app: tauri::AppHandle, playlist_id: String) -> Result<bool, String> {
    controls::run_command(&app, "play_playlist", |client| async move {
        client.play_playlist(&playlist_id).await
    })
    .await?;
    overlay::hide_panel(&app, PanelKind::Playlists)?;
    Ok(true)
}
