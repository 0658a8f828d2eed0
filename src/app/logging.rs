//! Usage: Process-wide tracing setup (stderr + daily rolling file under `<app data>/logs`).

use crate::app_paths;
use std::sync::OnceLock;
use tauri::Runtime;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "spotify-overlay";
const MAX_LOG_FILES: usize = 7;
const DEFAULT_FILTER: &str = "info";

// Dropping the guard stops the background writer; keep it for the life of the process.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn file_appender<R: Runtime>(app: &tauri::AppHandle<R>) -> Option<RollingFileAppender> {
    let dir = match app_paths::logs_dir(app) {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("spotify-overlay: file logging disabled: {err}");
            return None;
        }
    };
    match RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(&dir)
    {
        Ok(appender) => Some(appender),
        Err(err) => {
            eprintln!(
                "spotify-overlay: file logging disabled ({}): {err}",
                dir.display()
            );
            None
        }
    }
}

/// Installs the global subscriber once; later calls (tests, second setup) are no-ops.
pub(crate) fn init<R: Runtime>(app: &tauri::AppHandle<R>) {
    if FILE_GUARD.get().is_some() {
        return;
    }

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter());

    let file_layer = file_appender(app).map(|appender| {
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .with_filter(env_filter())
    });

    let subscriber = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer);

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return;
    }
    // Tauri and its plugins log through the `log` facade.
    if let Err(err) = tracing_log::LogTracer::init() {
        tracing::debug!("log bridge already installed: {}", err);
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "spotify overlay logging initialized"
    );
}
