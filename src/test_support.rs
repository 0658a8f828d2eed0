//! Usage: Public test helpers for integration tests.

use std::path::PathBuf;

fn serialize_json(
    value: impl serde::Serialize,
) -> crate::shared::error::AppResult<serde_json::Value> {
    Ok(serde_json::to_value(value)
        .map_err(|e| format!("SYSTEM_ERROR: failed to serialize json: {e}"))?)
}

fn deserialize_json<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
) -> crate::shared::error::AppResult<T> {
    Ok(serde_json::from_value(value)
        .map_err(|e| format!("SEC_INVALID_INPUT: invalid json: {e}"))?)
}

pub fn app_data_dir<R: tauri::Runtime>(
    app: &tauri::AppHandle<R>,
) -> crate::shared::error::AppResult<PathBuf> {
    crate::infra::app_paths::app_data_dir(app)
}

pub fn settings_get_json<R: tauri::Runtime>(
    app: &tauri::AppHandle<R>,
) -> crate::shared::error::AppResult<serde_json::Value> {
    serialize_json(crate::infra::settings::read(app)?)
}

pub fn settings_set_json<R: tauri::Runtime>(
    app: &tauri::AppHandle<R>,
    settings: serde_json::Value,
) -> crate::shared::error::AppResult<serde_json::Value> {
    let settings: crate::infra::settings::AppSettings = deserialize_json(settings)?;
    serialize_json(crate::infra::settings::write(app, &settings)?)
}

/// Partial update as sent by `settings_set`; returns the stored settings plus the change flags.
pub fn settings_update_json<R: tauri::Runtime>(
    app: &tauri::AppHandle<R>,
    update: serde_json::Value,
) -> crate::shared::error::AppResult<serde_json::Value> {
    let update: crate::infra::settings::SettingsUpdate = deserialize_json(update)?;
    let applied = crate::infra::settings::apply_update(app, update)?;
    Ok(serde_json::json!({
        "settings": serialize_json(applied.settings)?,
        "shortcuts_changed": applied.shortcuts_changed,
        "tray_changed": applied.tray_changed,
    }))
}

pub fn settings_file_path<R: tauri::Runtime>(
    app: &tauri::AppHandle<R>,
) -> crate::shared::error::AppResult<PathBuf> {
    Ok(app_data_dir(app)?.join("settings.json"))
}

pub fn credentials_get_json<R: tauri::Runtime>(
    app: &tauri::AppHandle<R>,
) -> crate::shared::error::AppResult<serde_json::Value> {
    serialize_json(crate::infra::credentials::read(app)?)
}

pub fn credentials_save_json<R: tauri::Runtime>(
    app: &tauri::AppHandle<R>,
    credentials: serde_json::Value,
) -> crate::shared::error::AppResult<serde_json::Value> {
    let credentials: crate::infra::credentials::Credentials = deserialize_json(credentials)?;
    serialize_json(crate::infra::credentials::write(app, &credentials)?)
}

pub fn credentials_clear<R: tauri::Runtime>(
    app: &tauri::AppHandle<R>,
) -> crate::shared::error::AppResult<bool> {
    crate::infra::credentials::clear(app)
}

pub fn tokens_save_json<R: tauri::Runtime>(
    app: &tauri::AppHandle<R>,
    tokens: serde_json::Value,
) -> crate::shared::error::AppResult<()> {
    let tokens: crate::infra::token_store::StoredTokens = deserialize_json(tokens)?;
    crate::infra::token_store::save(app, &tokens)
}

pub fn tokens_load_json<R: tauri::Runtime>(
    app: &tauri::AppHandle<R>,
) -> crate::shared::error::AppResult<Option<serde_json::Value>> {
    crate::infra::token_store::load(app)?
        .map(serialize_json)
        .transpose()
}

pub fn tokens_clear<R: tauri::Runtime>(
    app: &tauri::AppHandle<R>,
) -> crate::shared::error::AppResult<()> {
    crate::infra::token_store::clear(app)
}

/// Validates a shortcut bindings object the way `settings_set` does.
pub fn shortcut_bindings_check(
    bindings: serde_json::Value,
) -> crate::shared::error::AppResult<()> {
    let bindings: crate::infra::settings::ShortcutBindings = deserialize_json(bindings)?;
    crate::app::shortcuts::ShortcutTable::from_bindings(&bindings).map(|_| ())
}

/// Builds the overlay view from a raw `GET /me/player` body (`None` for 204).
pub fn now_playing_from_json(
    playback: Option<serde_json::Value>,
) -> crate::shared::error::AppResult<serde_json::Value> {
    let playback: Option<crate::spotify::models::PlaybackState> =
        playback.map(deserialize_json).transpose()?;
    serialize_json(crate::spotify::now_playing::NowPlayingView::from_playback(
        playback.as_ref(),
    ))
}
