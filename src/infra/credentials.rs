//! Usage: Spotify app credentials (client id / secret / redirect URI) with environment overrides.

use crate::app_paths;
use crate::auth::endpoints::DEFAULT_REDIRECT_URI;
use crate::infra::json_file;
use crate::shared::error::AppResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tauri::Runtime;

const CREDENTIALS_FILE_NAME: &str = "credentials.json";
pub(crate) const ENV_CLIENT_ID: &str = "SPOTIFY_CLIENT_ID";
pub(crate) const ENV_CLIENT_SECRET: &str = "SPOTIFY_CLIENT_SECRET";
pub(crate) const ENV_REDIRECT_URI: &str = "SPOTIFY_REDIRECT_URI";

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// No secret: authorize with PKCE instead of HTTP Basic client auth.
    pub public_client: bool,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &crate::shared::security::mask_token(&self.client_secret),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("public_client", &self.public_client)
            .finish()
    }
}

impl Credentials {
    pub fn is_complete(&self) -> bool {
        let has_id = !self.client_id.trim().is_empty();
        let has_secret = !self.client_secret.trim().is_empty();
        has_id && (has_secret || self.public_client)
    }

    pub fn redirect_uri_or_default(&self) -> &str {
        let uri = self.redirect_uri.trim();
        if uri.is_empty() {
            DEFAULT_REDIRECT_URI
        } else {
            uri
        }
    }

    /// Secret used for client authentication; `None` selects the PKCE public-client flow.
    pub(crate) fn secret(&self) -> Option<&str> {
        let secret = self.client_secret.trim();
        if self.public_client || secret.is_empty() {
            None
        } else {
            Some(secret)
        }
    }

    fn trimmed(&self) -> Self {
        Self {
            client_id: self.client_id.trim().to_string(),
            client_secret: self.client_secret.trim().to_string(),
            redirect_uri: self.redirect_uri_or_default().to_string(),
            public_client: self.public_client,
        }
    }
}

/// Values taken from the process environment (optionally populated from `.env`).
#[derive(Debug, Clone, Default)]
pub(crate) struct EnvOverrides {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

impl EnvOverrides {
    pub(crate) fn from_env() -> Self {
        fn var(key: &str) -> Option<String> {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().trim_matches(['"', '\'']).to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            client_id: var(ENV_CLIENT_ID),
            client_secret: var(ENV_CLIENT_SECRET),
            redirect_uri: var(ENV_REDIRECT_URI),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.client_id.is_none() && self.client_secret.is_none() && self.redirect_uri.is_none()
    }
}

pub(crate) fn apply_env_overrides(stored: Credentials, overrides: &EnvOverrides) -> Credentials {
    let mut merged = stored;
    if let Some(id) = overrides.client_id.as_ref() {
        merged.client_id = id.clone();
    }
    if let Some(secret) = overrides.client_secret.as_ref() {
        merged.client_secret = secret.clone();
        merged.public_client = false;
    }
    if let Some(uri) = overrides.redirect_uri.as_ref() {
        merged.redirect_uri = uri.clone();
    }
    merged
}

/// Loopback redirect target parsed from the configured redirect URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RedirectTarget {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl RedirectTarget {
    pub(crate) fn uri_with_port(&self, port: u16) -> String {
        format!("http://{}:{port}{}", self.host, self.path)
    }
}

pub(crate) fn parse_redirect_uri(raw: &str) -> AppResult<RedirectTarget> {
    let url = reqwest::Url::parse(raw.trim())
        .map_err(|e| format!("SEC_INVALID_INPUT: redirect URI is not a valid URL: {e}"))?;
    if url.scheme() != "http" {
        return Err("SEC_INVALID_INPUT: redirect URI must use http:// (local loopback callback)".into());
    }
    let host = url.host_str().unwrap_or_default().to_string();
    let is_loopback = host == "localhost"
        || host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<std::net::IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false);
    if !is_loopback {
        return Err(
            "SEC_INVALID_INPUT: redirect URI host must be 127.0.0.1, localhost or [::1]".into(),
        );
    }
    let port = url
        .port()
        .ok_or_else(|| "SEC_INVALID_INPUT: redirect URI must include an explicit port".to_string())?;
    let path = url.path().to_string();
    if path.is_empty() || path == "/" {
        return Err("SEC_INVALID_INPUT: redirect URI must include a callback path".into());
    }
    Ok(RedirectTarget { host, port, path })
}

pub fn validate(creds: &Credentials) -> AppResult<()> {
    let client_id = creds.client_id.trim();
    if client_id.is_empty() {
        return Err("SEC_INVALID_INPUT: client ID is required".into());
    }
    if client_id.chars().any(char::is_whitespace) {
        return Err("SEC_INVALID_INPUT: client ID must not contain spaces".into());
    }
    if !creds.public_client {
        let secret = creds.client_secret.trim();
        if secret.is_empty() {
            return Err("SEC_INVALID_INPUT: client secret is required".into());
        }
        if secret.chars().any(char::is_whitespace) {
            return Err("SEC_INVALID_INPUT: client secret must not contain spaces".into());
        }
    }
    parse_redirect_uri(creds.redirect_uri_or_default())?;
    Ok(())
}

fn credentials_path<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<PathBuf> {
    Ok(app_paths::app_data_dir(app)?.join(CREDENTIALS_FILE_NAME))
}

pub(crate) fn read_stored(path: &Path) -> AppResult<Credentials> {
    Ok(json_file::read::<Credentials>(path)?.unwrap_or_default())
}

/// Stored credentials merged with environment overrides; environment wins.
pub fn read<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<Credentials> {
    let stored = read_stored(&credentials_path(app)?)?;
    let overrides = EnvOverrides::from_env();
    if !overrides.is_empty() {
        tracing::debug!("spotify credentials overridden from environment");
    }
    Ok(apply_env_overrides(stored, &overrides))
}

pub fn write<R: Runtime>(app: &tauri::AppHandle<R>, creds: &Credentials) -> AppResult<Credentials> {
    let creds = creds.trimmed();
    validate(&creds)?;
    let path = credentials_path(app)?;
    json_file::write_atomic(&path, &creds, true)?;
    tracing::info!(
        client_id = %creds.client_id,
        public_client = creds.public_client,
        "spotify credentials saved"
    );
    Ok(creds)
}

pub fn clear<R: Runtime>(app: &tauri::AppHandle<R>) -> AppResult<bool> {
    json_file::remove(&credentials_path(app)?)
}
