//! Usage: Overlay window commands (hover expand, panel toggles, close).

use crate::app::overlay::{self, HoverSurface, OverlayState, PanelKind};

#[tauri::command]
#[specta::specta]
pub(crate) fn overlay_state_get(app: tauri::AppHandle) -> OverlayState {
    overlay::snapshot(&app)
}

#[tauri::command]
#[specta::specta]
pub(crate) fn overlay_set_expanded(app: tauri::AppHandle, expanded: bool) -> Result<OverlayState, String> {
    overlay::set_expanded(&app, expanded).map_err(Into::into)
}

/// Pointer enter/leave from the overlay, a panel, or the volume slider drag.
#[tauri::command]
#[specta::specta]
pub(crate) fn overlay_hover(
    app: tauri::AppHandle,
    surface: HoverSurface,
    active: bool,
) -> Result<OverlayState, String> {
    overlay::set_hover(&app, surface, active).map_err(Into::into)
}

#[tauri::command]
#[specta::specta]
pub(crate) async fn overlay_toggle_queue(app: tauri::AppHandle) -> Result<OverlayState, String> {
    overlay::toggle_panel(&app, PanelKind::Queue).map_err(Into::into)
}

#[tauri::command]
#[specta::specta]
pub(crate) async fn overlay_toggle_playlists(app: tauri::AppHandle) -> Result<OverlayState, String> {
    overlay::toggle_panel(&app, PanelKind::Playlists).map_err(Into::into)
}

#[tauri::command]
#[specta::specta]
pub(crate) async fn overlay_hide_panel(app: tauri::AppHandle, panel: PanelKind) -> Result<OverlayState, String> {
    overlay::hide_panel(&app, panel).map_err(Into::into)
}

/// The overlay's close button: hides the panels, then quits.
#[tauri::command]
#[specta::specta]
pub(crate) fn overlay_close(app: tauri::AppHandle) -> Result<bool, String> {
    overlay::quit(&app, "overlay_close");
    Ok(true)
}
