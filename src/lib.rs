mod app;
mod auth;
mod commands;
mod infra;
mod shared;
mod spotify;
pub mod test_support;

pub(crate) use app::app_state;
pub(crate) use infra::{app_paths, settings};
pub(crate) use shared::blocking;

use app::{login_task, overlay, poller, shortcuts, tray};
use commands::*;
use tauri::Manager;

/// Decides the first window: the setup wizard until credentials exist, then the overlay
/// (plus a browser login when no tokens are stored).
async fn startup(app: tauri::AppHandle) {
    let Some(state) = app.try_state::<app_state::SpotifyState>() else {
        return;
    };
    let creds = state.session().credentials().await;
    if !creds.is_complete() {
        tracing::info!("spotify credentials missing, opening setup wizard");
        if let Err(err) = overlay::show_setup(&app) {
            tracing::error!("failed to open setup wizard: {}", err);
        }
        return;
    }

    if let Err(err) = overlay::show_overlay(&app) {
        tracing::error!("failed to show overlay: {}", err);
    }
    if !state.session().is_authenticated() {
        tracing::info!("no stored spotify tokens, starting login");
        login_task::spawn_login(&app);
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // `.env` in the working directory may carry SPOTIFY_CLIENT_ID / SPOTIFY_CLIENT_SECRET.
    let dotenv_path = dotenvy::dotenv().ok();

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app, _argv, _cwd| {
            tracing::info!("second instance launched, focusing the running overlay");
            if let Err(err) = overlay::show_overlay(app) {
                tracing::warn!("failed to focus overlay: {}", err);
            }
        }))
        .manage(poller::PollerState::default())
        .manage(overlay::OverlayRuntime::default())
        .manage(shortcuts::ShortcutRegistry::default())
        .plugin(tauri_plugin_opener::init())
        .plugin(
            tauri_plugin_global_shortcut::Builder::new()
                .with_handler(|app, shortcut, event| shortcuts::handle_event(app, shortcut, event))
                .build(),
        )
        .on_window_event(overlay::on_window_event)
        .setup(move |app| {
            crate::app::logging::init(app.handle());
            if let Some(path) = dotenv_path.as_ref() {
                tracing::info!(path = %path.display(), "loaded environment from .env");
            }

            // Payload is not logged; it can carry request data.
            std::panic::set_hook(Box::new(|panic_info| {
                let location = panic_info
                    .location()
                    .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                    .unwrap_or_else(|| "unknown".to_string());
                tracing::error!(
                    location = %location,
                    "PANIC: application panicked at {location}. Check the log file for context leading up to this panic."
                );
            }));

            let handle = app.handle().clone();
            let cfg = match settings::read(&handle) {
                Ok(cfg) => cfg,
                Err(err) => {
                    tracing::warn!("settings read failed, using defaults: {}", err);
                    settings::AppSettings::default()
                }
            };

            let spotify = app_state::init(&handle).map_err(|err| {
                tracing::error!("spotify session init failed: {}", err);
                err
            })?;
            app.manage(spotify);

            if let Err(err) = shortcuts::apply(&handle, &cfg.shortcuts) {
                tracing::error!("global shortcuts not registered: {}", err);
            }
            if cfg.tray_enabled {
                if let Err(err) = tray::set_enabled(&handle, true) {
                    tracing::error!("tray init failed: {}", err);
                }
            }
            overlay::restore_position(&handle, cfg.overlay_position);
            poller::start(&handle);

            tauri::async_runtime::spawn(startup(handle));
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            settings_get,
            settings_set,
            setup_status,
            setup_validate_credentials,
            setup_save_credentials,
            setup_open_dashboard,
            setup_finish,
            auth_status,
            auth_login,
            auth_logout,
            playback_get,
            playback_toggle,
            playback_next,
            playback_previous,
            playback_set_volume,
            queue_get,
            playlists_list,
            playlist_play,
            overlay_state_get,
            overlay_set_expanded,
            overlay_hover,
            overlay_toggle_queue,
            overlay_toggle_playlists,
            overlay_hide_panel,
            overlay_close,
            app_about_get,
            app_exit,
            app_frontend_error_report,
            app_first_run_tips_ack,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|app_handle, event| {
        if let tauri::RunEvent::Exit = event {
            tracing::info!("spotify overlay exiting");
        }

        #[cfg(target_os = "macos")]
        if let tauri::RunEvent::Reopen {
            has_visible_windows,
            ..
        } = event
        {
            if !has_visible_windows {
                let _ = overlay::show_overlay(app_handle);
            }
        }
        #[cfg(not(target_os = "macos"))]
        let _ = app_handle;
    });
}

/// Specta type export configuration.
///
/// Run `cargo test export_bindings -- --ignored` to regenerate `ui/generated/bindings.ts`.
#[cfg(test)]
#[test]
#[ignore = "run manually: cargo test export_bindings -- --ignored"]
fn export_bindings() {
    let builder =
        tauri_specta::Builder::<tauri::Wry>::new().commands(tauri_specta::collect_commands![
            commands::settings::settings_get,
            commands::settings::settings_set,
            commands::setup::setup_status,
            commands::setup::setup_validate_credentials,
            commands::setup::setup_save_credentials,
            commands::setup::setup_open_dashboard,
            commands::setup::setup_finish,
            commands::auth::auth_status,
            commands::auth::auth_login,
            commands::auth::auth_logout,
            commands::playback::playback_get,
            commands::playback::playback_toggle,
            commands::playback::playback_next,
            commands::playback::playback_previous,
            commands::playback::playback_set_volume,
            commands::playback::queue_get,
            commands::playback::playlists_list,
            commands::playback::playlist_play,
            commands::overlay::overlay_state_get,
            commands::overlay::overlay_set_expanded,
            commands::overlay::overlay_hover,
            commands::overlay::overlay_toggle_queue,
            commands::overlay::overlay_toggle_playlists,
            commands::overlay::overlay_hide_panel,
            commands::overlay::overlay_close,
            commands::app::app_about_get,
            commands::app::app_exit,
            commands::app::app_frontend_error_report,
            commands::app::app_first_run_tips_ack
        ]);

    std::fs::create_dir_all("ui/generated").expect("create ui/generated");
    builder
        .export(
            specta_typescript::Typescript::default(),
            "ui/generated/bindings.ts",
        )
        .expect("failed to export specta TypeScript bindings");
}
