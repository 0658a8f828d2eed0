//! Usage: Background playback poller (emits `playback:state` / `playback:error` to the WebView).

use crate::app::app_state;
use crate::shared::error::{AppError, ErrorPayload};
use crate::shared::mutex_ext::MutexExt;
use crate::spotify::now_playing::NowPlayingView;
use crate::{blocking, settings};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tauri::{Emitter, Manager, Runtime};
use tokio::sync::Notify;

pub(crate) const EVENT_PLAYBACK_STATE: &str = "playback:state";
pub(crate) const EVENT_PLAYBACK_ERROR: &str = "playback:error";

#[derive(Debug, Default)]
struct LastReport {
    view: Option<NowPlayingView>,
    error: Option<(String, String)>,
}

#[derive(Default)]
pub(crate) struct PollerState {
    wake: Notify,
    started: AtomicBool,
    last: Mutex<LastReport>,
}

impl PollerState {
    /// Returns true when `view` differs from the last one emitted.
    fn record_view(&self, view: &NowPlayingView) -> bool {
        let mut last = self.last.lock_or_recover();
        last.error = None;
        if last.view.as_ref() == Some(view) {
            return false;
        }
        last.view = Some(view.clone());
        true
    }

    /// Returns true when `err` differs from the last failure; the next success is always emitted.
    fn record_error(&self, err: &AppError) -> bool {
        let mut last = self.last.lock_or_recover();
        last.view = None;
        let key = (err.code().to_string(), err.message().to_string());
        if last.error.as_ref() == Some(&key) {
            return false;
        }
        last.error = Some(key);
        true
    }

    fn wake(&self) {
        self.wake.notify_one();
    }
}

/// Starts the poll loop once; later calls are no-ops.
pub(crate) fn start<R: Runtime>(app: &tauri::AppHandle<R>) {
    let Some(state) = app.try_state::<PollerState>() else {
        tracing::warn!("poller state missing, playback refresh disabled");
        return;
    };
    if state.started.swap(true, Ordering::SeqCst) {
        return;
    }
    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        run_loop(app).await;
    });
}

/// Wakes the poller after `delay` so a command's effect shows up without waiting a full interval.
pub(crate) fn request_refresh<R: Runtime>(app: &tauri::AppHandle<R>, delay: Duration) {
    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(state) = app.try_state::<PollerState>() {
            state.wake();
        }
    });
}

async fn refresh_interval<R: Runtime>(app: &tauri::AppHandle<R>) -> Duration {
    let app = app.clone();
    let ms = blocking::run("poller_read_settings", move || settings::read(&app))
        .await
        .map(|cfg| cfg.refresh_interval_ms)
        .unwrap_or(settings::DEFAULT_REFRESH_INTERVAL_MS);
    Duration::from_millis(u64::from(ms))
}

async fn run_loop<R: Runtime>(app: tauri::AppHandle<R>) {
    tracing::info!("playback poller started");
    loop {
        let interval = refresh_interval(&app).await;
        poll_once(&app).await;

        let Some(state) = app.try_state::<PollerState>() else {
            return;
        };
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = state.wake.notified() => {}
        }
    }
}

/// One refresh; does nothing while logged out.
pub(crate) async fn poll_once<R: Runtime>(app: &tauri::AppHandle<R>) {
    let Ok(client) = app_state::spotify_client(app) else {
        return;
    };
    if !client.session().is_authenticated() {
        return;
    }
    let result = client.current_playback().await;
    let Some(state) = app.try_state::<PollerState>() else {
        return;
    };

    match result {
        Ok(playback) => {
            let view = NowPlayingView::from_playback(playback.as_ref());
            if state.record_view(&view) {
                tracing::debug!(active = view.active, is_playing = view.is_playing, "playback changed");
                let _ = app.emit(EVENT_PLAYBACK_STATE, &view);
            }
        }
        Err(err) => {
            if state.record_error(&err) {
                tracing::warn!(code = err.code(), "playback refresh failed: {}", err);
                let _ = app.emit(EVENT_PLAYBACK_ERROR, ErrorPayload::from(&err));
            }
        }
    }
}

/// Pushes a failed user action to the overlay through the same channel as poll errors.
pub(crate) fn report_error<R: Runtime>(app: &tauri::AppHandle<R>, err: &AppError) {
    if let Some(state) = app.try_state::<PollerState>() {
        // Forget the last failure so the next poll re-reports its own outcome.
        state.last.with_lock(|last| last.error = None);
    }
    let _ = app.emit(EVENT_PLAYBACK_ERROR, ErrorPayload::from(err));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::{CODE_NO_ACTIVE_DEVICE, CODE_SYSTEM};

    #[test]
    fn unchanged_view_is_not_reported_twice() {
        let state = PollerState::default();
        let idle = NowPlayingView::idle();
        assert!(state.record_view(&idle));
        assert!(!state.record_view(&idle));

        let mut playing = NowPlayingView::idle();
        playing.active = true;
        playing.title = "Song".to_string();
        assert!(state.record_view(&playing));
    }

    #[test]
    fn repeated_error_is_reported_once_per_change() {
        let state = PollerState::default();
        let offline = AppError::new(CODE_SYSTEM, "connection refused");
        assert!(state.record_error(&offline));
        assert!(!state.record_error(&offline));

        let no_device = AppError::new(CODE_NO_ACTIVE_DEVICE, "no active Spotify device");
        assert!(state.record_error(&no_device));
    }

    #[test]
    fn success_after_error_is_reported_even_if_view_unchanged() {
        let state = PollerState::default();
        let idle = NowPlayingView::idle();
        assert!(state.record_view(&idle));
        assert!(state.record_error(&AppError::new(CODE_SYSTEM, "timeout")));
        assert!(state.record_view(&idle));
        // And the same error after recovery counts as new.
        assert!(state.record_error(&AppError::new(CODE_SYSTEM, "timeout")));
    }
}
