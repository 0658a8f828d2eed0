//! Usage: Persisted application settings (schema + read/write helpers).

use crate::app::shortcuts::{ShortcutAction, ShortcutTable};
use crate::app_paths;
use crate::infra::json_file;
use crate::shared::error::AppResult;
use crate::shared::mutex_ext::MutexExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, RwLock};
use std::time::{Duration, Instant};
use tauri::Runtime;

pub const SCHEMA_VERSION: u32 = 2;
const SCHEMA_VERSION_ADD_SHORTCUT_BINDINGS: u32 = 2;
pub const DEFAULT_REFRESH_INTERVAL_MS: u32 = 2000;
pub const MIN_REFRESH_INTERVAL_MS: u32 = 500;
pub const MAX_REFRESH_INTERVAL_MS: u32 = 60_000;
pub const DEFAULT_POST_COMMAND_REFRESH_DELAY_MS: u32 = 400;
const MAX_POST_COMMAND_REFRESH_DELAY_MS: u32 = 5000;
pub const DEFAULT_PLAYLIST_LIMIT: u32 = 20;
pub const DEFAULT_QUEUE_DISPLAY_LIMIT: u32 = 10;
const MAX_LIST_LIMIT: u32 = 50;
const CACHE_TTL: Duration = Duration::from_secs(5);
const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Clone)]
struct CachedSettings {
    path: PathBuf,
    data: AppSettings,
    last_updated: Instant,
}

static SETTINGS_CACHE: OnceLock<RwLock<Option<CachedSettings>>> = OnceLock::new();

/// Serializes read-modify-write cycles (position saves, tips ack, `settings_set`).
static WRITE_LOCK: Mutex<()> = Mutex::new(());

/// Accelerator strings understood by the global-shortcut plugin, one per action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
#[serde(default)]
pub struct ShortcutBindings {
    pub toggle_playback: String,
    pub next_track: String,
    pub previous_track: String,
    pub show_queue: String,
    pub show_playlists: String,
}

impl Default for ShortcutBindings {
    fn default() -> Self {
        Self {
            toggle_playback: ShortcutAction::TogglePlayback.default_accelerator().to_string(),
            next_track: ShortcutAction::NextTrack.default_accelerator().to_string(),
            previous_track: ShortcutAction::PreviousTrack.default_accelerator().to_string(),
            show_queue: ShortcutAction::ShowQueue.default_accelerator().to_string(),
            show_playlists: ShortcutAction::ShowPlaylists.default_accelerator().to_string(),
        }
    }
}

impl ShortcutBindings {
    pub fn get(&self, action: ShortcutAction) -> &str {
        match action {
            ShortcutAction::TogglePlayback => &self.toggle_playback,
            ShortcutAction::NextTrack => &self.next_track,
            ShortcutAction::PreviousTrack => &self.previous_track,
            ShortcutAction::ShowQueue => &self.show_queue,
            ShortcutAction::ShowPlaylists => &self.show_playlists,
        }
    }

    fn get_mut(&mut self, action: ShortcutAction) -> &mut String {
        match action {
            ShortcutAction::TogglePlayback => &mut self.toggle_playback,
            ShortcutAction::NextTrack => &mut self.next_track,
            ShortcutAction::PreviousTrack => &mut self.previous_track,
            ShortcutAction::ShowQueue => &mut self.show_queue,
            ShortcutAction::ShowPlaylists => &mut self.show_playlists,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
pub struct OverlayPosition {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
#[serde(default)]
pub struct AppSettings {
    pub schema_version: u32,
    pub refresh_interval_ms: u32,
    pub post_command_refresh_delay_ms: u32,
    pub playlist_limit: u32,
    pub queue_display_limit: u32,
    pub shortcuts: ShortcutBindings,
    // Last dragged position of the main overlay; `None` lets the window manager place it.
    pub overlay_position: Option<OverlayPosition>,
    pub tray_enabled: bool,
    pub first_run_tips_shown: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            post_command_refresh_delay_ms: DEFAULT_POST_COMMAND_REFRESH_DELAY_MS,
            playlist_limit: DEFAULT_PLAYLIST_LIMIT,
            queue_display_limit: DEFAULT_QUEUE_DISPLAY_LIMIT,
            shortcuts: ShortcutBindings::default(),
            overlay_position: None,
            tray_enabled: true,
            first_run_tips_shown: false,
        }
    }
}

fn clamp_field(value: &mut u32, min: u32, max: u32) -> bool {
    let clamped = (*value).clamp(min, max);
    if clamped != *value {
        *value = clamped;
        return true;
    }
    false
}

fn sanitize_timing(settings: &mut AppSettings) -> bool {
    let mut changed = false;
    changed |= clamp_field(
        &mut settings.refresh_interval_ms,
        MIN_REFRESH_INTERVAL_MS,
        MAX_REFRESH_INTERVAL_MS,
    );
    changed |= clamp_field(
        &mut settings.post_command_refresh_delay_ms,
        0,
        MAX_POST_COMMAND_REFRESH_DELAY_MS,
    );
    changed
}

fn sanitize_list_limits(settings: &mut AppSettings) -> bool {
    let mut changed = false;
    changed |= clamp_field(&mut settings.playlist_limit, 1, MAX_LIST_LIMIT);
    changed |= clamp_field(&mut settings.queue_display_limit, 1, MAX_LIST_LIMIT);
    changed
}

fn sanitize_shortcuts(settings: &mut AppSettings) -> bool {
    let mut changed = false;
    for action in ShortcutAction::ALL {
        let binding = settings.shortcuts.get_mut(action);
        let trimmed = binding.trim();
        if trimmed.is_empty() {
            *binding = action.default_accelerator().to_string();
            changed = true;
        } else if trimmed.len() != binding.len() {
            *binding = trimmed.to_string();
            changed = true;
        }
    }

    // An unparseable or conflicting table falls back to defaults as a whole.
    if let Err(err) = ShortcutTable::from_bindings(&settings.shortcuts) {
        tracing::warn!("invalid shortcut table in settings.json, restoring defaults: {}", err);
        settings.shortcuts = ShortcutBindings::default();
        changed = true;
    }
    changed
}

/// Schema migration helper for versions that only bump `schema_version`.
///
/// Returns `true` if the settings were modified.
fn migrate_bump_schema_version(
    settings: &mut AppSettings,
    schema_version_present: bool,
    target_version: u32,
) -> bool {
    if schema_version_present && settings.schema_version >= target_version {
        return false;
    }

    let mut changed = false;

    // Missing schema_version: persist it so the migration does not rerun on every startup.
    if !schema_version_present {
        changed = true;
    }

    if settings.schema_version != target_version {
        settings.schema_version = target_version;
        changed = true;
    }

    changed
}

fn migrate_add_shortcut_bindings(settings: &mut AppSettings, schema_version_present: bool) -> bool {
    // v2: configurable shortcut table (v1 used the fixed defaults).
    migrate_bump_schema_version(
        settings,
        schema_version_present,
        SCHEMA_VERSION_ADD_SHORTCUT_BINDINGS,
    )
}

/// Applies migrations and sanitizers; returns `true` when the file should be rewritten.
fn repair(settings: &mut AppSettings, schema_version_present: bool) -> bool {
    let mut repaired = false;
    repaired |= migrate_add_shortcut_bindings(settings, schema_version_present);
    repaired |= sanitize_timing(settings);
    repaired |= sanitize_list_limits(settings);
    repaired |= sanitize_shortcuts(settings);
    repaired
}

fn settings_path<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<PathBuf> {
    Ok(app_paths::app_data_dir(app)?.join(SETTINGS_FILE_NAME))
}

fn parse_settings_json(content: &str) -> AppResult<(AppSettings, bool)> {
    let raw: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| format!("SYSTEM_ERROR: failed to parse settings.json: {e}"))?;
    let schema_version_present = raw.get("schema_version").is_some();
    let settings: AppSettings = serde_json::from_value(raw)
        .map_err(|e| format!("SYSTEM_ERROR: failed to parse settings.json: {e}"))?;
    Ok((settings, schema_version_present))
}

fn cached(path: &Path) -> Option<AppSettings> {
    let cache = SETTINGS_CACHE.get_or_init(|| RwLock::new(None));
    let guard = cache.read().ok()?;
    let cached = guard.as_ref()?;
    if cached.path == path && cached.last_updated.elapsed() < CACHE_TTL {
        return Some(cached.data.clone());
    }
    None
}

fn update_cache(path: &Path, settings: &AppSettings) {
    let cache = SETTINGS_CACHE.get_or_init(|| RwLock::new(None));
    if let Ok(mut guard) = cache.write() {
        *guard = Some(CachedSettings {
            path: path.to_path_buf(),
            data: settings.clone(),
            last_updated: Instant::now(),
        });
    }
}

pub(crate) fn read_from(path: &Path) -> AppResult<AppSettings> {
    if let Some(settings) = cached(path) {
        return Ok(settings);
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let settings = AppSettings::default();
            // Best-effort: create settings.json on first read so it is discoverable and editable.
            if let Err(err) = write_to(path, &settings) {
                tracing::warn!("failed to create default settings.json: {}", err);
                update_cache(path, &settings);
            }
            return Ok(settings);
        }
        Err(err) => return Err(format!("SYSTEM_ERROR: failed to read settings: {err}").into()),
    };

    let (mut settings, schema_version_present) = parse_settings_json(&content)?;
    if repair(&mut settings, schema_version_present) {
        // Best-effort: persist repaired values while keeping read semantics.
        if let Err(err) = json_file::write_atomic(path, &settings, false) {
            tracing::warn!("failed to persist repaired settings.json: {}", err);
        }
    }

    update_cache(path, &settings);
    Ok(settings)
}

pub fn read<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<AppSettings> {
    read_from(&settings_path(app)?)
}

fn validate(settings: &AppSettings) -> AppResult<()> {
    if !(MIN_REFRESH_INTERVAL_MS..=MAX_REFRESH_INTERVAL_MS).contains(&settings.refresh_interval_ms)
    {
        return Err(format!(
            "SEC_INVALID_INPUT: refresh_interval_ms must be between {MIN_REFRESH_INTERVAL_MS} and {MAX_REFRESH_INTERVAL_MS}"
        )
        .into());
    }
    if settings.post_command_refresh_delay_ms > MAX_POST_COMMAND_REFRESH_DELAY_MS {
        return Err(format!(
            "SEC_INVALID_INPUT: post_command_refresh_delay_ms must be <= {MAX_POST_COMMAND_REFRESH_DELAY_MS}"
        )
        .into());
    }
    if !(1..=MAX_LIST_LIMIT).contains(&settings.playlist_limit) {
        return Err(format!(
            "SEC_INVALID_INPUT: playlist_limit must be between 1 and {MAX_LIST_LIMIT}"
        )
        .into());
    }
    if !(1..=MAX_LIST_LIMIT).contains(&settings.queue_display_limit) {
        return Err(format!(
            "SEC_INVALID_INPUT: queue_display_limit must be between 1 and {MAX_LIST_LIMIT}"
        )
        .into());
    }
    ShortcutTable::from_bindings(&settings.shortcuts)?;
    Ok(())
}

pub(crate) fn write_to(path: &Path, settings: &AppSettings) -> AppResult<AppSettings> {
    validate(settings)?;

    let mut settings = settings.clone();
    settings.schema_version = SCHEMA_VERSION;
    json_file::write_atomic(path, &settings, false)?;
    update_cache(path, &settings);
    Ok(settings)
}

pub fn write<R: Runtime>(
    app: &tauri::AppHandle<R>,
    settings: &AppSettings,
) -> AppResult<AppSettings> {
    let path = settings_path(app)?;
    let _guard = WRITE_LOCK.lock_or_recover();
    write_to(&path, settings)
}

pub(crate) fn update_at(path: &Path, f: impl FnOnce(&mut AppSettings)) -> AppResult<AppSettings> {
    let _guard = WRITE_LOCK.lock_or_recover();
    let mut settings = read_from(path)?;
    f(&mut settings);
    write_to(path, &settings)
}

/// Read-modify-write helper for single-field updates from the backend.
pub fn update<R: Runtime>(
    app: &tauri::AppHandle<R>,
    f: impl FnOnce(&mut AppSettings),
) -> AppResult<AppSettings> {
    update_at(&settings_path(app)?, f)
}

/// Partial settings change sent by the settings form; omitted fields keep their value.
#[derive(Debug, Clone, Default, Deserialize, specta::Type)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsUpdate {
    pub refresh_interval_ms: Option<u32>,
    pub post_command_refresh_delay_ms: Option<u32>,
    pub playlist_limit: Option<u32>,
    pub queue_display_limit: Option<u32>,
    pub shortcuts: Option<ShortcutBindings>,
    pub tray_enabled: Option<bool>,
}

impl SettingsUpdate {
    /// `previous` with the given fields replaced; numbers are clamped into their ranges.
    pub(crate) fn merge_into(self, previous: &AppSettings) -> AppSettings {
        let mut next = previous.clone();
        if let Some(ms) = self.refresh_interval_ms {
            next.refresh_interval_ms = ms;
        }
        if let Some(ms) = self.post_command_refresh_delay_ms {
            next.post_command_refresh_delay_ms = ms;
        }
        if let Some(limit) = self.playlist_limit {
            next.playlist_limit = limit;
        }
        if let Some(limit) = self.queue_display_limit {
            next.queue_display_limit = limit;
        }
        if let Some(shortcuts) = self.shortcuts {
            next.shortcuts = shortcuts;
        }
        if let Some(enabled) = self.tray_enabled {
            next.tray_enabled = enabled;
        }
        sanitize_timing(&mut next);
        sanitize_list_limits(&mut next);
        next
    }
}

/// Outcome of [`apply_update`]: the stored settings and which live subsystems need a refresh.
#[derive(Debug, Clone)]
pub(crate) struct AppliedUpdate {
    pub settings: AppSettings,
    pub shortcuts_changed: bool,
    pub tray_changed: bool,
}

/// Merges `update` and persists it. An invalid shortcut table rejects the whole update and
/// leaves the file untouched.
pub(crate) fn apply_update<R: Runtime>(
    app: &tauri::AppHandle<R>,
    update: SettingsUpdate,
) -> AppResult<AppliedUpdate> {
    let path = settings_path(app)?;
    let _guard = WRITE_LOCK.lock_or_recover();
    let previous = read_from(&path)?;
    let settings = write_to(&path, &update.merge_into(&previous))?;
    Ok(AppliedUpdate {
        shortcuts_changed: settings.shortcuts != previous.shortcuts,
        tray_changed: settings.tray_enabled != previous.tray_enabled,
        settings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- sanitizers --

    #[test]
    fn sanitize_timing_clamps_both_ends() {
        let mut s = AppSettings {
            refresh_interval_ms: 10,
            post_command_refresh_delay_ms: 99_999,
            ..Default::default()
        };
        assert!(sanitize_timing(&mut s));
        assert_eq!(s.refresh_interval_ms, MIN_REFRESH_INTERVAL_MS);
        assert_eq!(s.post_command_refresh_delay_ms, MAX_POST_COMMAND_REFRESH_DELAY_MS);
    }

    #[test]
    fn sanitize_list_limits_resets_zero() {
        let mut s = AppSettings {
            playlist_limit: 0,
            queue_display_limit: 500,
            ..Default::default()
        };
        assert!(sanitize_list_limits(&mut s));
        assert_eq!(s.playlist_limit, 1);
        assert_eq!(s.queue_display_limit, MAX_LIST_LIMIT);
    }

    #[test]
    fn sanitize_no_change_for_defaults() {
        let mut s = AppSettings::default();
        assert!(!repair(&mut s, true));
    }

    #[test]
    fn sanitize_shortcuts_fills_blank_binding() {
        let mut s = AppSettings::default();
        s.shortcuts.show_queue = "   ".to_string();
        assert!(sanitize_shortcuts(&mut s));
        assert_eq!(s.shortcuts.show_queue, "CommandOrControl+Shift+Q");
    }

    #[test]
    fn sanitize_shortcuts_restores_defaults_on_duplicates() {
        let mut s = AppSettings::default();
        s.shortcuts.next_track = s.shortcuts.toggle_playback.clone();
        assert!(sanitize_shortcuts(&mut s));
        assert_eq!(s.shortcuts, ShortcutBindings::default());
    }

    // -- migrations --

    #[test]
    fn migrate_missing_schema_version_forces_write() {
        let (mut s, present) = parse_settings_json(r#"{"refresh_interval_ms": 3000}"#).expect("parse");
        assert!(!present);
        assert!(migrate_add_shortcut_bindings(&mut s, present));
        assert_eq!(s.schema_version, SCHEMA_VERSION);
        assert_eq!(s.refresh_interval_ms, 3000);
    }

    #[test]
    fn migrate_v1_bumps_to_current() {
        let (mut s, present) = parse_settings_json(r#"{"schema_version": 1}"#).expect("parse");
        assert!(repair(&mut s, present));
        assert_eq!(s.schema_version, SCHEMA_VERSION);
        assert_eq!(s.shortcuts, ShortcutBindings::default());
    }

    // -- validation --

    #[test]
    fn write_rejects_out_of_range_interval() {
        let s = AppSettings {
            refresh_interval_ms: 100,
            ..Default::default()
        };
        let err = validate(&s).expect_err("too fast");
        assert_eq!(err.code(), "SEC_INVALID_INPUT");
    }

    #[test]
    fn write_rejects_unparseable_shortcut() {
        let mut s = AppSettings::default();
        s.shortcuts.show_playlists = "Ctrl+Banana".to_string();
        assert!(validate(&s).is_err());
    }

    #[test]
    fn update_merges_only_given_fields_and_clamps() {
        let previous = AppSettings {
            playlist_limit: 30,
            ..Default::default()
        };
        let next = SettingsUpdate {
            refresh_interval_ms: Some(100),
            queue_display_limit: Some(0),
            ..Default::default()
        }
        .merge_into(&previous);
        assert_eq!(next.refresh_interval_ms, MIN_REFRESH_INTERVAL_MS);
        assert_eq!(next.queue_display_limit, 1);
        assert_eq!(next.playlist_limit, 30);
        assert_eq!(next.shortcuts, previous.shortcuts);
        assert!(next.tray_enabled);
    }

    #[test]
    fn update_accepts_camel_case_partial_json() {
        let update: SettingsUpdate =
            serde_json::from_str(r#"{"playlistLimit": 5}"#).expect("partial update");
        assert_eq!(update.playlist_limit, Some(5));
        assert!(update.refresh_interval_ms.is_none());
    }

    // -- persistence --

    #[test]
    fn concurrent_updates_are_not_lost() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        update_at(&path, |s| s.playlist_limit = 1).expect("seed");

        let workers: Vec<_> = (0..16)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    update_at(&path, |s| s.playlist_limit += 1).expect("update");
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("join");
        }

        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read back")).expect("json");
        assert_eq!(on_disk["playlist_limit"], 17);
    }

    #[test]
    fn first_read_creates_default_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        let s = read_from(&path).expect("read");
        assert_eq!(s, AppSettings::default());
        assert!(path.exists());
    }

    #[test]
    fn read_repairs_file_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, r#"{"schema_version":1,"playlist_limit":0}"#).expect("write");

        let s = read_from(&path).expect("read");
        assert_eq!(s.playlist_limit, 1);

        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read back")).expect("json");
        assert_eq!(on_disk["schema_version"], SCHEMA_VERSION);
        assert_eq!(on_disk["playlist_limit"], 1);
    }

    #[test]
    fn write_updates_cache_for_same_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        let s = AppSettings {
            tray_enabled: false,
            overlay_position: Some(OverlayPosition { x: -20, y: 40 }),
            ..Default::default()
        };
        write_to(&path, &s).expect("write");
        let read_back = read_from(&path).expect("read");
        assert!(!read_back.tray_enabled);
        assert_eq!(read_back.overlay_position, Some(OverlayPosition { x: -20, y: 40 }));
    }
}
