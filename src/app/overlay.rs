//! Usage: Overlay window management (main overlay, docked queue/playlists panels, setup wizard).

use crate::infra::settings::OverlayPosition;
use crate::shared::error::AppResult;
use crate::shared::mutex_ext::MutexExt;
use crate::{blocking, settings};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tauri::{
    Emitter, LogicalSize, Manager, PhysicalPosition, Runtime, WebviewUrl, WebviewWindow,
    WebviewWindowBuilder, WindowEvent,
};

pub(crate) const MAIN_LABEL: &str = "main";
pub(crate) const SETUP_LABEL: &str = "setup";
pub(crate) const EVENT_OVERLAY_STATE: &str = "overlay:state";

pub(crate) const MAIN_WIDTH: f64 = 320.0;
pub(crate) const COLLAPSED_HEIGHT: f64 = 100.0;
pub(crate) const EXPANDED_HEIGHT: f64 = 280.0;
const PANEL_WIDTH: f64 = 350.0;
const PANEL_HEIGHT: f64 = 480.0;
const PANEL_GAP: f64 = 10.0;
const SETUP_WIDTH: f64 = 700.0;
const SETUP_HEIGHT: f64 = 600.0;
const POSITION_SAVE_DEBOUNCE: Duration = Duration::from_millis(500);
const QUIT_DELAY: Duration = Duration::from_millis(200);
// Crossing the gap between the overlay and a docked panel takes a moment.
const HOVER_COLLAPSE_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    Queue,
    Playlists,
}

impl PanelKind {
    pub(crate) const ALL: [PanelKind; 2] = [Self::Queue, Self::Playlists];

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::Playlists => "playlists",
        }
    }

    fn page(self) -> &'static str {
        match self {
            Self::Queue => "queue.html",
            Self::Playlists => "playlists.html",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Queue => "Queue",
            Self::Playlists => "Playlists",
        }
    }

    pub(crate) fn refresh_event(self) -> &'static str {
        match self {
            Self::Queue => "queue:refresh",
            Self::Playlists => "playlists:refresh",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }
}

/// Payload of `overlay:state` and of the overlay commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, specta::Type)]
pub struct OverlayState {
    pub expanded: bool,
    pub queue_visible: bool,
    pub playlists_visible: bool,
}

impl OverlayState {
    fn panel_visible(&self, kind: PanelKind) -> bool {
        match kind {
            PanelKind::Queue => self.queue_visible,
            PanelKind::Playlists => self.playlists_visible,
        }
    }

    fn set_panel_visible(&mut self, kind: PanelKind, visible: bool) {
        match kind {
            PanelKind::Queue => self.queue_visible = visible,
            PanelKind::Playlists => self.playlists_visible = visible,
        }
    }
}

/// Something that keeps the overlay expanded while the pointer is on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, specta::Type)]
#[serde(rename_all = "snake_case")]
pub enum HoverSurface {
    Main,
    Queue,
    Playlists,
    /// The volume slider is held; the pointer may leave the window mid-drag.
    VolumeDrag,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct HoverState {
    main: bool,
    queue: bool,
    playlists: bool,
    volume_drag: bool,
}

impl HoverState {
    fn set(&mut self, surface: HoverSurface, active: bool) {
        match surface {
            HoverSurface::Main => self.main = active,
            HoverSurface::Queue => self.queue = active,
            HoverSurface::Playlists => self.playlists = active,
            HoverSurface::VolumeDrag => self.volume_drag = active,
        }
    }

    /// Hovering a panel only counts while that panel is shown.
    pub(crate) fn keeps_expanded(&self, overlay: &OverlayState) -> bool {
        self.main
            || self.volume_drag
            || (self.queue && overlay.queue_visible)
            || (self.playlists && overlay.playlists_visible)
    }
}

#[derive(Default)]
pub(crate) struct OverlayRuntime {
    state: Mutex<OverlayState>,
    hover: Mutex<HoverState>,
    move_generation: AtomicU64,
    hover_generation: AtomicU64,
}

impl OverlayRuntime {
    fn snapshot(&self) -> OverlayState {
        *self.state.lock_or_recover()
    }

    fn bump_move_generation(&self) -> u64 {
        self.move_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_latest_move(&self, generation: u64) -> bool {
        self.move_generation.load(Ordering::SeqCst) == generation
    }

    /// Records a hover change; returns whether the overlay should stay expanded and the
    /// generation a delayed collapse must still match.
    fn record_hover(&self, surface: HoverSurface, active: bool) -> (bool, u64) {
        let overlay = self.snapshot();
        let keep = self.hover.with_lock(|hover| {
            hover.set(surface, active);
            hover.keeps_expanded(&overlay)
        });
        (keep, self.hover_generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn should_collapse(&self, generation: u64) -> bool {
        let overlay = self.snapshot();
        self.hover_generation.load(Ordering::SeqCst) == generation
            && !self.hover.lock_or_recover().keeps_expanded(&overlay)
    }
}

/// Physical-pixel rectangle of a window or monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Top-left corner of a panel docked beside `main`: the queue on the right, playlists on the left.
pub(crate) fn panel_position(kind: PanelKind, main: Rect, panel_width: i32, gap: i32) -> (i32, i32) {
    match kind {
        PanelKind::Queue => (main.x + main.width + gap, main.y),
        PanelKind::Playlists => (main.x - panel_width - gap, main.y),
    }
}

/// A saved position is only reused when its top-left corner is still on a connected monitor.
pub(crate) fn position_on_screen(position: OverlayPosition, monitors: &[Rect]) -> bool {
    monitors
        .iter()
        .any(|monitor| monitor.contains(position.x, position.y))
}

fn scaled(logical: f64, scale_factor: f64) -> i32 {
    (logical * scale_factor).round() as i32
}

fn window_rect<R: Runtime>(window: &WebviewWindow<R>) -> AppResult<Rect> {
    let position = window.outer_position()?;
    let size = window.outer_size()?;
    Ok(Rect {
        x: position.x,
        y: position.y,
        width: i32::try_from(size.width).unwrap_or(i32::MAX),
        height: i32::try_from(size.height).unwrap_or(i32::MAX),
    })
}

fn runtime<R: Runtime>(app: &tauri::AppHandle<R>) -> Option<tauri::State<'_, OverlayRuntime>> {
    app.try_state::<OverlayRuntime>()
}

pub(crate) fn snapshot<R: Runtime>(app: &tauri::AppHandle<R>) -> OverlayState {
    runtime(app).map(|rt| rt.snapshot()).unwrap_or_default()
}

fn update_state<R: Runtime>(
    app: &tauri::AppHandle<R>,
    f: impl FnOnce(&mut OverlayState),
) -> OverlayState {
    let Some(rt) = runtime(app) else {
        return OverlayState::default();
    };
    let next = rt.state.with_lock(|state| {
        f(state);
        *state
    });
    let _ = app.emit(EVENT_OVERLAY_STATE, next);
    next
}

fn main_window<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<WebviewWindow<R>> {
    app.get_webview_window(MAIN_LABEL)
        .ok_or_else(|| "SYSTEM_ERROR: main overlay window is missing".to_string().into())
}

fn ensure_panel<R: Runtime>(app: &tauri::AppHandle<R>, kind: PanelKind) -> AppResult<WebviewWindow<R>> {
    if let Some(window) = app.get_webview_window(kind.label()) {
        return Ok(window);
    }
    tracing::debug!(panel = kind.label(), "creating overlay panel");
    let window = WebviewWindowBuilder::new(app, kind.label(), WebviewUrl::App(kind.page().into()))
        .title(kind.title())
        .inner_size(PANEL_WIDTH, PANEL_HEIGHT)
        .resizable(false)
        .decorations(false)
        .transparent(true)
        .shadow(false)
        .always_on_top(true)
        .skip_taskbar(true)
        .visible(false)
        .build()?;
    Ok(window)
}

fn position_panel<R: Runtime>(
    main: &WebviewWindow<R>,
    panel: &WebviewWindow<R>,
    kind: PanelKind,
) -> AppResult<()> {
    let scale = main.scale_factor()?;
    let (x, y) = panel_position(
        kind,
        window_rect(main)?,
        scaled(PANEL_WIDTH, scale),
        scaled(PANEL_GAP, scale),
    );
    panel.set_position(PhysicalPosition::new(x, y))?;
    Ok(())
}

/// Moves every visible panel back beside the main overlay.
pub(crate) fn reposition_panels<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<()> {
    let state = snapshot(app);
    let main = main_window(app)?;
    for kind in PanelKind::ALL {
        if !state.panel_visible(kind) {
            continue;
        }
        if let Some(panel) = app.get_webview_window(kind.label()) {
            position_panel(&main, &panel, kind)?;
        }
    }
    Ok(())
}

/// Resizes the main overlay for hover-expand; repeated calls with the same value do nothing.
pub(crate) fn set_expanded<R: Runtime>(app: &tauri::AppHandle<R>, expanded: bool) -> AppResult<OverlayState> {
    let current = snapshot(app);
    if current.expanded == expanded {
        return Ok(current);
    }
    let height = if expanded { EXPANDED_HEIGHT } else { COLLAPSED_HEIGHT };
    main_window(app)?.set_size(LogicalSize::new(MAIN_WIDTH, height))?;
    let next = update_state(app, |state| state.expanded = expanded);
    if expanded {
        reposition_panels(app)?;
    }
    Ok(next)
}

/// Hides a visible panel; otherwise creates it on first use, docks it, shows it and asks it to reload.
pub(crate) fn toggle_panel<R: Runtime>(app: &tauri::AppHandle<R>, kind: PanelKind) -> AppResult<OverlayState> {
    if snapshot(app).panel_visible(kind) {
        return hide_panel(app, kind);
    }
    show_panel(app, kind)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PanelHotkey {
    /// The overlay is hidden: bring it back with the panel docked beside it.
    RevealWithPanel,
    Toggle,
}

pub(crate) fn panel_hotkey(main_visible: bool) -> PanelHotkey {
    if main_visible {
        PanelHotkey::Toggle
    } else {
        PanelHotkey::RevealWithPanel
    }
}

/// ShowQueue / ShowPlaylists hotkeys; a panel is never shown next to a hidden overlay.
pub(crate) fn panel_from_hotkey<R: Runtime>(
    app: &tauri::AppHandle<R>,
    kind: PanelKind,
) -> AppResult<OverlayState> {
    match panel_hotkey(main_window(app)?.is_visible()?) {
        PanelHotkey::Toggle => toggle_panel(app, kind),
        PanelHotkey::RevealWithPanel => {
            show_overlay(app)?;
            show_panel(app, kind)
        }
    }
}

fn show_panel<R: Runtime>(app: &tauri::AppHandle<R>, kind: PanelKind) -> AppResult<OverlayState> {
    let main = main_window(app)?;
    let panel = ensure_panel(app, kind)?;
    position_panel(&main, &panel, kind)?;
    panel.show()?;
    let _ = app.emit_to(kind.label(), kind.refresh_event(), ());
    Ok(update_state(app, |state| state.set_panel_visible(kind, true)))
}

pub(crate) fn hide_panel<R: Runtime>(
    app: &tauri::AppHandle<R>,
    kind: PanelKind,
) -> AppResult<OverlayState> {
    if let Some(panel) = app.get_webview_window(kind.label()) {
        panel.hide()?;
    }
    let was_visible = snapshot(app).panel_visible(kind);
    let next = update_state(app, |state| state.set_panel_visible(kind, false));
    if was_visible {
        // A hidden panel never reports leave; re-evaluate without it.
        let surface = match kind {
            PanelKind::Queue => HoverSurface::Queue,
            PanelKind::Playlists => HoverSurface::Playlists,
        };
        if let Err(err) = set_hover(app, surface, false) {
            tracing::debug!(panel = kind.label(), "failed to re-check hover: {}", err);
        }
    }
    Ok(next)
}

/// Pointer entered or left one of the overlay's surfaces. Entering expands at once; leaving
/// collapses after a short delay unless another surface picked the pointer up meanwhile.
pub(crate) fn set_hover<R: Runtime>(
    app: &tauri::AppHandle<R>,
    surface: HoverSurface,
    active: bool,
) -> AppResult<OverlayState> {
    let Some(rt) = runtime(app) else {
        return Ok(OverlayState::default());
    };
    let (keep, generation) = rt.record_hover(surface, active);
    if keep {
        return set_expanded(app, true);
    }
    let current = rt.snapshot();
    if !current.expanded {
        return Ok(current);
    }

    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        tokio::time::sleep(HOVER_COLLAPSE_DELAY).await;
        if !runtime(&app).is_some_and(|rt| rt.should_collapse(generation)) {
            return;
        }
        if let Err(err) = set_expanded(&app, false) {
            tracing::debug!("failed to collapse overlay: {}", err);
        }
    });
    Ok(current)
}

/// Hides both panels; the main overlay stays as is.
pub(crate) fn close_all<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<OverlayState> {
    let mut state = snapshot(app);
    for kind in PanelKind::ALL {
        state = hide_panel(app, kind)?;
    }
    Ok(state)
}

/// Hides every panel, then exits once the invoking command has had time to answer.
pub(crate) fn quit<R: Runtime>(app: &tauri::AppHandle<R>, reason: &'static str) {
    if let Err(err) = close_all(app) {
        tracing::warn!("failed to hide panels before exit: {}", err);
    }
    tracing::info!(reason, "spotify overlay quitting");
    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        tokio::time::sleep(QUIT_DELAY).await;
        app.exit(0);
    });
}

pub(crate) fn show_overlay<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<()> {
    let main = main_window(app)?;
    main.show()?;
    let _ = main.set_always_on_top(true);
    Ok(())
}

/// Tray Show/Hide: hiding the overlay also hides its panels.
pub(crate) fn toggle_overlay_visibility<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<()> {
    let main = main_window(app)?;
    if main.is_visible()? {
        close_all(app)?;
        main.hide()?;
    } else {
        show_overlay(app)?;
    }
    Ok(())
}

pub(crate) fn show_setup<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<()> {
    if let Some(window) = app.get_webview_window(SETUP_LABEL) {
        window.show()?;
        window.set_focus()?;
        return Ok(());
    }
    WebviewWindowBuilder::new(app, SETUP_LABEL, WebviewUrl::App("setup.html".into()))
        .title("Spotify Overlay Setup")
        .inner_size(SETUP_WIDTH, SETUP_HEIGHT)
        .resizable(false)
        .center()
        .focused(true)
        .build()?;
    Ok(())
}

pub(crate) fn close_setup<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<()> {
    if let Some(window) = app.get_webview_window(SETUP_LABEL) {
        window.close()?;
    }
    Ok(())
}

/// Moves the main overlay to its saved position when that spot is still on screen.
pub(crate) fn restore_position<R: Runtime>(app: &tauri::AppHandle<R>, position: Option<OverlayPosition>) {
    let Some(position) = position else {
        return;
    };
    let Ok(main) = main_window(app) else {
        return;
    };
    let monitors: Vec<Rect> = main
        .available_monitors()
        .unwrap_or_default()
        .iter()
        .map(|m| Rect {
            x: m.position().x,
            y: m.position().y,
            width: i32::try_from(m.size().width).unwrap_or(i32::MAX),
            height: i32::try_from(m.size().height).unwrap_or(i32::MAX),
        })
        .collect();
    if !position_on_screen(position, &monitors) {
        tracing::info!(x = position.x, y = position.y, "saved overlay position is off screen, ignoring");
        return;
    }
    if let Err(err) = main.set_position(PhysicalPosition::new(position.x, position.y)) {
        tracing::warn!("failed to restore overlay position: {}", err);
    }
}

fn schedule_position_save<R: Runtime>(app: &tauri::AppHandle<R>, position: PhysicalPosition<i32>) {
    let Some(generation) = runtime(app).map(|rt| rt.bump_move_generation()) else {
        return;
    };
    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        tokio::time::sleep(POSITION_SAVE_DEBOUNCE).await;
        if !runtime(&app).is_some_and(|rt| rt.is_latest_move(generation)) {
            return;
        }
        let saved = OverlayPosition {
            x: position.x,
            y: position.y,
        };
        let result = blocking::run("overlay_save_position", {
            let app = app.clone();
            move || settings::update(&app, |cfg| cfg.overlay_position = Some(saved))
        })
        .await;
        match result {
            Ok(_) => tracing::debug!(x = saved.x, y = saved.y, "overlay position saved"),
            Err(err) => tracing::warn!("failed to save overlay position: {}", err),
        }
    });
}

/// Window event hook: panels hide instead of closing, closing the overlay quits, and moving
/// the overlay drags its panels along.
pub(crate) fn on_window_event<R: Runtime>(window: &tauri::Window<R>, event: &WindowEvent) {
    let app = window.app_handle();
    match event {
        WindowEvent::Moved(position) if window.label() == MAIN_LABEL => {
            if let Err(err) = reposition_panels(app) {
                tracing::debug!("failed to reposition panels: {}", err);
            }
            schedule_position_save(app, *position);
        }
        WindowEvent::CloseRequested { api, .. } => {
            if window.label() == MAIN_LABEL {
                tracing::info!("overlay closed, exiting");
                app.exit(0);
                return;
            }
            if let Some(kind) = PanelKind::from_label(window.label()) {
                api.prevent_close();
                if let Err(err) = hide_panel(app, kind) {
                    tracing::warn!(panel = kind.label(), "failed to hide panel: {}", err);
                }
            }
        }
        _ => {}
    }
}
