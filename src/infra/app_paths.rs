//! Usage: Resolve the per-user data directory (`$HOME/.spotify-overlay`) and its children.

use crate::shared::error::AppResult;
use std::path::PathBuf;
use tauri::{Manager, Runtime};

const DEFAULT_DOTDIR_NAME: &str = ".spotify-overlay";
const DOTDIR_ENV: &str = "SPOTIFY_OVERLAY_DOTDIR_NAME";
const LOGS_DIR_NAME: &str = "logs";

fn dotdir_name() -> String {
    std::env::var(DOTDIR_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.contains(['/', '\\']))
        .unwrap_or_else(|| DEFAULT_DOTDIR_NAME.to_string())
}

pub fn app_data_dir<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<PathBuf> {
    let home = app
        .path()
        .home_dir()
        .map_err(|e| format!("SYSTEM_ERROR: failed to resolve home dir: {e}"))?;
    let dir = home.join(dotdir_name());
    std::fs::create_dir_all(&dir)
        .map_err(|e| format!("SYSTEM_ERROR: failed to create app data dir {}: {e}", dir.display()))?;
    Ok(dir)
}

pub fn logs_dir<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<PathBuf> {
    let dir = app_data_dir(app)?.join(LOGS_DIR_NAME);
    std::fs::create_dir_all(&dir)
        .map_err(|e| format!("SYSTEM_ERROR: failed to create logs dir {}: {e}", dir.display()))?;
    Ok(dir)
}
