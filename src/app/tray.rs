//! Usage: System tray icon and menu (show/hide overlay, setup, login, quit).

use crate::app::{login_task, overlay};
use crate::shared::error::AppResult;
use tauri::menu::{Menu, MenuEvent, MenuItem, PredefinedMenuItem};
use tauri::tray::TrayIconBuilder;
use tauri::Runtime;

const TRAY_ID: &str = "main";
const MENU_TOGGLE_OVERLAY: &str = "tray_toggle_overlay";
const MENU_SETUP: &str = "tray_setup";
const MENU_LOGIN: &str = "tray_login";
const MENU_QUIT: &str = "tray_quit";

fn on_menu_event<R: Runtime>(app: &tauri::AppHandle<R>, event: MenuEvent) {
    let result = match event.id.as_ref() {
        MENU_TOGGLE_OVERLAY => overlay::toggle_overlay_visibility(app),
        MENU_SETUP => overlay::show_setup(app),
        MENU_LOGIN => {
            login_task::spawn_login(app);
            Ok(())
        }
        MENU_QUIT => {
            overlay::quit(app, "tray");
            Ok(())
        }
        _ => Ok(()),
    };
    if let Err(err) = result {
        tracing::warn!(item = %event.id.as_ref(), "tray action failed: {}", err);
    }
}

fn build<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<()> {
    let toggle = MenuItem::with_id(app, MENU_TOGGLE_OVERLAY, "Show/Hide Overlay", true, None::<&str>)?;
    let setup = MenuItem::with_id(app, MENU_SETUP, "Setup…", true, None::<&str>)?;
    let login = MenuItem::with_id(app, MENU_LOGIN, "Log in to Spotify", true, None::<&str>)?;
    let separator = PredefinedMenuItem::separator(app)?;
    let quit = MenuItem::with_id(app, MENU_QUIT, "Quit", true, None::<&str>)?;
    let menu = Menu::with_items(app, &[&toggle, &setup, &login, &separator, &quit])?;

    let mut builder = TrayIconBuilder::with_id(TRAY_ID)
        .tooltip("Spotify Overlay")
        .menu(&menu)
        .show_menu_on_left_click(true)
        .on_menu_event(on_menu_event);
    if let Some(icon) = app.default_window_icon() {
        builder = builder.icon(icon.clone());
    }
    builder.build(app)?;
    Ok(())
}

/// Shows or hides the tray icon, creating it the first time it is enabled.
pub(crate) fn set_enabled<R: Runtime>(app: &tauri::AppHandle<R>, enabled: bool) -> AppResult<()> {
    if let Some(tray) = app.tray_by_id(TRAY_ID) {
        tray.set_visible(enabled)?;
        return Ok(());
    }
    if enabled {
        build(app)?;
        tracing::info!("tray icon created");
    }
    Ok(())
}
