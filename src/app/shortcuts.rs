//! Usage: Global hotkey table (action <-> accelerator) and registration with the OS.

use crate::infra::settings::ShortcutBindings;
use crate::shared::error::{AppError, AppResult, CODE_INVALID_INPUT};
use crate::shared::mutex_ext::MutexExt;
use serde::Serialize;
use std::sync::Mutex;
use tauri::{Manager, Runtime};
use tauri_plugin_global_shortcut::{GlobalShortcutExt, Shortcut, ShortcutEvent, ShortcutState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, specta::Type)]
#[serde(rename_all = "snake_case")]
pub enum ShortcutAction {
    TogglePlayback,
    NextTrack,
    PreviousTrack,
    ShowQueue,
    ShowPlaylists,
}

impl ShortcutAction {
    pub const ALL: [ShortcutAction; 5] = [
        Self::TogglePlayback,
        Self::NextTrack,
        Self::PreviousTrack,
        Self::ShowQueue,
        Self::ShowPlaylists,
    ];

    pub fn default_accelerator(self) -> &'static str {
        match self {
            Self::TogglePlayback => "CommandOrControl+Shift+Space",
            Self::NextTrack => "CommandOrControl+Shift+N",
            Self::PreviousTrack => "CommandOrControl+Shift+B",
            Self::ShowQueue => "CommandOrControl+Shift+Q",
            Self::ShowPlaylists => "CommandOrControl+Shift+L",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::TogglePlayback => "Play/Pause",
            Self::NextTrack => "Next track",
            Self::PreviousTrack => "Previous track",
            Self::ShowQueue => "Show queue",
            Self::ShowPlaylists => "Show playlists",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ShortcutTable {
    entries: Vec<(Shortcut, ShortcutAction)>,
}

impl ShortcutTable {
    /// Parses every binding; unparseable or repeated accelerators reject the whole table.
    pub(crate) fn from_bindings(bindings: &ShortcutBindings) -> AppResult<Self> {
        let mut entries: Vec<(Shortcut, ShortcutAction)> = Vec::with_capacity(ShortcutAction::ALL.len());
        for action in ShortcutAction::ALL {
            let raw = bindings.get(action).trim();
            let shortcut: Shortcut = raw.parse().map_err(|e| {
                AppError::new(
                    CODE_INVALID_INPUT,
                    format!("shortcut for {} is not a valid accelerator ({raw:?}): {e}", action.label()),
                )
            })?;
            if let Some((_, taken_by)) = entries.iter().find(|(existing, _)| *existing == shortcut) {
                return Err(AppError::new(
                    CODE_INVALID_INPUT,
                    format!(
                        "shortcut {raw:?} is assigned to both {} and {}",
                        taken_by.label(),
                        action.label()
                    ),
                ));
            }
            entries.push((shortcut, action));
        }
        Ok(Self { entries })
    }

    pub(crate) fn action_for(&self, shortcut: &Shortcut) -> Option<ShortcutAction> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == shortcut)
            .map(|(_, action)| *action)
    }

    pub(crate) fn shortcuts(&self) -> impl Iterator<Item = &(Shortcut, ShortcutAction)> {
        self.entries.iter()
    }
}

/// Table currently registered with the OS; read by the plugin handler.
#[derive(Default)]
pub(crate) struct ShortcutRegistry(Mutex<ShortcutTable>);

/// Replaces all registered hotkeys with `bindings`. A binding the OS refuses (already taken by
/// another application) is logged and skipped; the rest stay active.
pub(crate) fn apply<R: Runtime>(app: &tauri::AppHandle<R>, bindings: &ShortcutBindings) -> AppResult<()> {
    let table = ShortcutTable::from_bindings(bindings)?;
    let manager = app.global_shortcut();
    if let Err(err) = manager.unregister_all() {
        tracing::warn!("failed to unregister previous shortcuts: {}", err);
    }

    let mut registered = 0usize;
    for (shortcut, action) in table.shortcuts() {
        match manager.register(*shortcut) {
            Ok(()) => registered += 1,
            Err(err) => tracing::warn!(
                action = ?action,
                shortcut = %shortcut.into_string(),
                "failed to register global shortcut: {}",
                err
            ),
        }
    }
    tracing::info!(registered, total = ShortcutAction::ALL.len(), "global shortcuts registered");

    if let Some(registry) = app.try_state::<ShortcutRegistry>() {
        *registry.0.lock_or_recover() = table;
    }
    Ok(())
}

/// Global-shortcut plugin handler: only key presses trigger actions.
pub(crate) fn handle_event<R: Runtime>(app: &tauri::AppHandle<R>, shortcut: &Shortcut, event: ShortcutEvent) {
    if event.state() != ShortcutState::Pressed {
        return;
    }
    let action = app
        .try_state::<ShortcutRegistry>()
        .and_then(|registry| registry.0.lock_or_recover().action_for(shortcut));
    let Some(action) = action else {
        return;
    };
    tracing::debug!(action = ?action, "global shortcut pressed");
    crate::app::controls::dispatch(app, action);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_parses_and_maps_each_action() {
        let table = ShortcutTable::from_bindings(&ShortcutBindings::default()).expect("defaults");
        for action in ShortcutAction::ALL {
            let shortcut: Shortcut = action.default_accelerator().parse().expect("parse");
            assert_eq!(table.action_for(&shortcut), Some(action));
        }
    }

    #[test]
    fn unknown_accelerator_is_not_mapped() {
        let table = ShortcutTable::from_bindings(&ShortcutBindings::default()).expect("defaults");
        let other: Shortcut = "CommandOrControl+Shift+Z".parse().expect("parse");
        assert_eq!(table.action_for(&other), None);
    }

    #[test]
    fn duplicate_accelerators_are_rejected() {
        let bindings = ShortcutBindings {
            next_track: "CommandOrControl+Shift+Space".to_string(),
            ..Default::default()
        };
        let err = ShortcutTable::from_bindings(&bindings).expect_err("duplicate");
        assert_eq!(err.code(), CODE_INVALID_INPUT);
        assert!(err.message().contains("Play/Pause"));
        assert!(err.message().contains("Next track"));
    }

    #[test]
    fn unparseable_accelerator_is_rejected() {
        let bindings = ShortcutBindings {
            show_queue: "Ctrl+Shift+NotAKey".to_string(),
            ..Default::default()
        };
        assert!(ShortcutTable::from_bindings(&bindings).is_err());
    }

    #[test]
    fn custom_binding_replaces_default() {
        let bindings = ShortcutBindings {
            show_playlists: "Alt+P".to_string(),
            ..Default::default()
        };
        let table = ShortcutTable::from_bindings(&bindings).expect("table");
        let alt_p: Shortcut = "Alt+P".parse().expect("parse");
        assert_eq!(table.action_for(&alt_p), Some(ShortcutAction::ShowPlaylists));
        let old: Shortcut = "CommandOrControl+Shift+L".parse().expect("parse");
        assert_eq!(table.action_for(&old), None);
    }
}
