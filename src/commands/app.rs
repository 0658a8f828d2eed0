//! Usage: App-level Tauri commands (about info, lifecycle, frontend error reports, tips).

use crate::app::overlay;
use crate::app::shortcuts::ShortcutAction;
use crate::{blocking, settings};

fn sanitize_text(input: Option<String>, max_len: usize) -> Option<String> {
    let value = input?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(max_len).collect())
}

#[derive(Debug, Clone, serde::Serialize, specta::Type)]
pub(crate) struct ShortcutInfo {
    action: ShortcutAction,
    label: String,
    accelerator: String,
}

#[derive(Debug, Clone, serde::Serialize, specta::Type)]
pub(crate) struct AppAboutInfo {
    os: String,
    arch: String,
    profile: String,
    app_version: String,
    shortcuts: Vec<ShortcutInfo>,
    first_run_tips_shown: bool,
}

#[tauri::command]
#[specta::specta]
pub(crate) async fn app_about_get(app: tauri::AppHandle) -> Result<AppAboutInfo, String> {
    let cfg = blocking::run("app_about_get", move || settings::read(&app)).await?;
    let shortcuts = ShortcutAction::ALL
        .into_iter()
        .map(|action| ShortcutInfo {
            action,
            label: action.label().to_string(),
            accelerator: cfg.shortcuts.get(action).to_string(),
        })
        .collect();

    Ok(AppAboutInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        profile: if cfg!(debug_assertions) {
            "debug".to_string()
        } else {
            "release".to_string()
        },
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        shortcuts,
        first_run_tips_shown: cfg.first_run_tips_shown,
    })
}

#[tauri::command]
#[specta::specta]
pub(crate) fn app_exit(app: tauri::AppHandle) -> Result<bool, String> {
    overlay::quit(&app, "app_exit");
    Ok(true)
}

#[tauri::command]
#[specta::specta]
pub(crate) fn app_frontend_error_report(
    window: tauri::WebviewWindow,
    source: String,
    message: String,
    stack: Option<String>,
    href: Option<String>,
) -> Result<bool, String> {
    let source = sanitize_text(Some(source), 128).unwrap_or_else(|| "unknown".to_string());
    let message = sanitize_text(Some(message), 4096).unwrap_or_else(|| "unknown".to_string());
    let stack = sanitize_text(stack, 16_384);
    let href = sanitize_text(href, 2_048);

    tracing::error!(
        target: "frontend",
        window = window.label(),
        source = %source,
        href = %href.as_deref().unwrap_or_default(),
        stack = %stack.as_deref().unwrap_or_default(),
        "frontend runtime error: {}",
        message
    );

    Ok(true)
}

/// Marks the shortcut tips as seen so the overlay stops showing them.
#[tauri::command]
#[specta::specta]
pub(crate) async fn app_first_run_tips_ack(app: tauri::AppHandle) -> Result<bool, String> {
    blocking::run("app_first_run_tips_ack", move || {
        settings::update(&app, |cfg| cfg.first_run_tips_shown = true)
    })
    .await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_text_trims_and_truncates() {
        assert_eq!(sanitize_text(Some("  hi  ".to_string()), 10).as_deref(), Some("hi"));
        assert_eq!(sanitize_text(Some("   ".to_string()), 10), None);
        assert_eq!(sanitize_text(None, 10), None);
        assert_eq!(sanitize_text(Some("abcdef".to_string()), 3).as_deref(), Some("abc"));
    }
}
