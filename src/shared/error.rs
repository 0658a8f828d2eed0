//! Usage: Unified application error model (maps internal failures to `CODE: message` strings).

use std::sync::Arc;

pub type AppResult<T> = Result<T, AppError>;

pub(crate) const CODE_INTERNAL: &str = "INTERNAL_ERROR";
pub(crate) const CODE_INVALID_INPUT: &str = "SEC_INVALID_INPUT";
pub(crate) const CODE_SYSTEM: &str = "SYSTEM_ERROR";
pub(crate) const CODE_CONFIG_MISSING: &str = "CONFIG_MISSING";
pub(crate) const CODE_AUTH_REQUIRED: &str = "AUTH_REQUIRED";
pub(crate) const CODE_AUTH_INVALID_CREDENTIALS: &str = "AUTH_INVALID_CREDENTIALS";
pub(crate) const CODE_AUTH_RELOGIN_REQUIRED: &str = "AUTH_RELOGIN_REQUIRED";
pub(crate) const CODE_NO_ACTIVE_DEVICE: &str = "SPOTIFY_NO_ACTIVE_DEVICE";
pub(crate) const CODE_SPOTIFY_API: &str = "SPOTIFY_API_ERROR";

#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct AppError {
    code: String,
    message: String,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

/// Serializable error shape pushed to the WebView alongside a remediation hint.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub(crate) struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub hint: Option<&'static str>,
}

impl From<&AppError> for ErrorPayload {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code.clone(),
            message: err.message.clone(),
            hint: remediation_hint(&err.code),
        }
    }
}

/// User-facing troubleshooting step for an error code.
pub(crate) fn remediation_hint(code: &str) -> Option<&'static str> {
    match code {
        CODE_AUTH_INVALID_CREDENTIALS => Some(
            "Re-enter your Client ID and Client Secret in Setup. Copy them without extra spaces and check that the Redirect URI matches exactly.",
        ),
        CODE_CONFIG_MISSING => Some("Open Setup and enter your Spotify app credentials."),
        CODE_AUTH_REQUIRED | CODE_AUTH_RELOGIN_REQUIRED => {
            Some("Log in to Spotify again from the tray menu or the Setup window.")
        }
        CODE_NO_ACTIVE_DEVICE => Some(
            "Start playing something in a Spotify client first, then try the controls again.",
        ),
        CODE_SPOTIFY_API => Some(
            "Make sure Spotify is running and playing. Restart Spotify and the overlay if controls stay unresponsive.",
        ),
        CODE_SYSTEM => Some("Check your internet connection, then restart the overlay."),
        _ => None,
    }
}

fn split_code_message(raw: &str) -> Option<(&str, &str)> {
    let msg = raw.trim();
    let msg = msg.strip_prefix("Error:").unwrap_or(msg).trim();
    if msg.is_empty() {
        return None;
    }

    let (maybe_code, rest) = msg.split_once(':')?;
    let code = maybe_code.trim();
    if code.is_empty() {
        return None;
    }
    let mut chars = code.chars();
    let first = chars.next()?;
    if !first.is_ascii_uppercase() {
        return None;
    }
    if !chars.all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_') {
        return None;
    }
    Some((code, rest.trim()))
}

impl From<String> for AppError {
    fn from(value: String) -> Self {
        if let Some((code, rest)) = split_code_message(&value) {
            let message = if rest.is_empty() { value.trim() } else { rest };
            return AppError::new(code.to_string(), message.to_string());
        }
        AppError::new(CODE_INTERNAL, value)
    }
}

impl From<&'static str> for AppError {
    fn from(value: &'static str) -> Self {
        AppError::from(value.to_string())
    }
}

impl From<tauri::Error> for AppError {
    fn from(value: tauri::Error) -> Self {
        AppError::new(CODE_SYSTEM, value.to_string())
    }
}

impl From<AppError> for String {
    fn from(value: AppError) -> Self {
        value.to_string()
    }
}
