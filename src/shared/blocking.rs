//! Usage: Run blocking work (settings / credential / token files) on the Tauri async runtime.

use crate::shared::error::{AppError, AppResult};
use std::time::{Duration, Instant};

/// File work slower than this is logged; the overlay polls every second or so.
const SLOW_TASK: Duration = Duration::from_millis(250);

pub async fn run<T, E>(
    label: &'static str,
    f: impl FnOnce() -> Result<T, E> + Send + 'static,
) -> AppResult<T>
where
    T: Send + 'static,
    E: Into<AppError> + Send + 'static,
{
    let started = Instant::now();
    let joined = tauri::async_runtime::spawn_blocking(f).await;

    let elapsed = started.elapsed();
    if elapsed >= SLOW_TASK {
        tracing::warn!(
            label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow blocking task"
        );
    }

    match joined {
        Ok(result) => result.map_err(Into::into),
        Err(err) => Err(join_failure(label, err)),
    }
}

// Panic payloads can echo file contents (credentials), so only the label reaches the UI.
fn join_failure(label: &'static str, err: tauri::Error) -> AppError {
    let reason = match err {
        tauri::Error::JoinError(join_err) if join_err.is_panic() => {
            tracing::error!(label, "blocking task panicked");
            "panicked"
        }
        tauri::Error::JoinError(_) => {
            tracing::warn!(label, "blocking task cancelled");
            "cancelled"
        }
        _ => {
            tracing::error!(label, "blocking task failed");
            "failed"
        }
    };
    AppError::new("TASK_JOIN", format!("{label}: task {reason}"))
}
