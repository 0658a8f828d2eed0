//! Usage: Settings-related Tauri commands.

use crate::app::{shortcuts, tray};
use crate::settings::{AppSettings, SettingsUpdate};
use crate::{blocking, settings};

#[tauri::command]
#[specta::specta]
pub(crate) async fn settings_get(app: tauri::AppHandle) -> Result<AppSettings, String> {
    blocking::run("settings_get", move || settings::read(&app))
        .await
        .map_err(Into::into)
}

/// Partial update; hotkeys and the tray are re-applied only when they changed.
#[tauri::command]
#[specta::specta]
pub(crate) async fn settings_set(
    app: tauri::AppHandle,
    update: SettingsUpdate,
) -> Result<AppSettings, String> {
    let app_for_work = app.clone();
    let applied =
        blocking::run("settings_set", move || settings::apply_update(&app_for_work, update))
            .await?;

    if applied.shortcuts_changed {
        if let Err(err) = shortcuts::apply(&app, &applied.settings.shortcuts) {
            tracing::warn!("failed to re-register shortcuts: {}", err);
        }
    }
    if applied.tray_changed {
        if let Err(err) = tray::set_enabled(&app, applied.settings.tray_enabled) {
            tracing::warn!("failed to update tray icon: {}", err);
        }
    }

    tracing::info!(
        refresh_interval_ms = applied.settings.refresh_interval_ms,
        tray_enabled = applied.settings.tray_enabled,
        shortcuts_changed = applied.shortcuts_changed,
        "settings updated"
    );
    Ok(applied.settings)
}
