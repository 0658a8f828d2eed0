//! Usage: Persisted OAuth tokens (`tokens.json`) and the sink trait the auth session writes through.

use crate::app_paths;
use crate::infra::json_file;
use crate::shared::error::AppResult;
use crate::shared::security::mask_token;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tauri::Runtime;

const TOKENS_FILE_NAME: &str = "tokens.json";

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix seconds, already reduced by the expiry safety buffer.
    pub expires_at: Option<i64>,
}

impl std::fmt::Debug for StoredTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredTokens")
            .field("access_token", &mask_token(&self.access_token))
            .field(
                "refresh_token",
                &self.refresh_token.as_deref().map(mask_token),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl StoredTokens {
    pub fn is_expired(&self, now_unix: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => now_unix >= expires_at,
            None => true,
        }
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}

/// Where the auth session persists token changes.
pub(crate) trait TokenSink: Send + Sync {
    fn save(&self, tokens: &StoredTokens) -> AppResult<()>;
    fn clear(&self) -> AppResult<()>;
}

pub(crate) struct FileTokenSink {
    path: PathBuf,
}

impl FileTokenSink {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub(crate) fn for_app<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<Self> {
        Ok(Self::new(tokens_path(app)?))
    }
}

impl TokenSink for FileTokenSink {
    fn save(&self, tokens: &StoredTokens) -> AppResult<()> {
        json_file::write_atomic(&self.path, tokens, true)
    }

    fn clear(&self) -> AppResult<()> {
        json_file::remove(&self.path).map(|_| ())
    }
}

fn tokens_path<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<PathBuf> {
    Ok(app_paths::app_data_dir(app)?.join(TOKENS_FILE_NAME))
}

pub(crate) fn load_from(path: &Path) -> Option<StoredTokens> {
    match json_file::read::<StoredTokens>(path) {
        Ok(Some(tokens)) if !tokens.access_token.trim().is_empty() => Some(tokens),
        Ok(_) => None,
        Err(err) => {
            tracing::warn!("ignoring unreadable token file: {}", err);
            None
        }
    }
}

pub fn load<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<Option<StoredTokens>> {
    Ok(load_from(&tokens_path(app)?))
}

pub fn save<R: Runtime>(app: &tauri::AppHandle<R>, tokens: &StoredTokens) -> AppResult<()> {
    FileTokenSink::for_app(app)?.save(tokens)
}

pub fn clear<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<()> {
    FileTokenSink::for_app(app)?.clear()
}
