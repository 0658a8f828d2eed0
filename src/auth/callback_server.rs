//! Usage: Loopback callback listener for the Spotify authorization code flow.

use crate::shared::error::{AppError, AppResult, CODE_SYSTEM};
use crate::shared::security::constant_time_eq;
use reqwest::Url;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub(crate) const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);
pub(crate) const PORT_ATTEMPTS: u16 = 10;

const SUCCESS_HTML: &str = "<html><body style=\"font-family:sans-serif;text-align:center;padding-top:40px\"><h1>Authentication successful</h1><p>You can close this window and return to Spotify Overlay.</p></body></html>";
const ERROR_HTML: &str = "<html><body style=\"font-family:sans-serif;text-align:center;padding-top:40px\"><h1>Authentication failed</h1><p>Close this window and try logging in again.</p></body></html>";
const NOT_FOUND_HTML: &str = "<html><body><h1>Not found</h1></body></html>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OAuthCallbackPayload {
    pub(crate) code: Option<String>,
    pub(crate) state: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) error_description: Option<String>,
}

#[derive(Debug)]
pub(crate) struct BoundCallbackListener {
    port: u16,
    listener_v4: Option<TcpListener>,
    listener_v6: Option<TcpListener>,
}

impl BoundCallbackListener {
    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    async fn accept(&mut self) -> std::io::Result<TcpStream> {
        let (stream, _) = match (self.listener_v4.as_mut(), self.listener_v6.as_mut()) {
            (Some(v4), Some(v6)) => {
                tokio::select! {
                    result = v4.accept() => result?,
                    result = v6.accept() => result?,
                }
            }
            (Some(v4), None) => v4.accept().await?,
            (None, Some(v6)) => v6.accept().await?,
            (None, None) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "no callback listener bound",
                ))
            }
        };
        Ok(stream)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindFamily {
    V4,
    V6,
    Both,
}

impl BindFamily {
    fn for_host(host: &str) -> Self {
        match host {
            "localhost" => Self::Both,
            h if h.starts_with('[') => Self::V6,
            _ => Self::V4,
        }
    }
}

/// Binds `preferred_port`, falling back to the following ports until `attempts` are used up.
pub(crate) async fn bind_callback_listener(
    host: &str,
    preferred_port: u16,
    attempts: u16,
) -> AppResult<BoundCallbackListener> {
    let family = BindFamily::for_host(host);
    if preferred_port == 0 {
        return try_bind_on_port(family, 0)
            .await
            .map_err(|e| format!("SYSTEM_ERROR: oauth callback bind failed: {e}").into());
    }

    let mut errors: Vec<String> = Vec::new();
    for offset in 0..attempts.max(1) {
        let Some(port) = preferred_port.checked_add(offset) else {
            break;
        };
        match try_bind_on_port(family, port).await {
            Ok(bound) => {
                if port != preferred_port {
                    tracing::warn!(
                        preferred_port,
                        port,
                        "callback port busy, using fallback port (it must also be registered as a redirect URI)"
                    );
                }
                return Ok(bound);
            }
            Err(err) => errors.push(err),
        }
    }

    Err(format!(
        "SYSTEM_ERROR: oauth callback bind failed after {attempts} attempts: {}",
        errors.join("; ")
    )
    .into())
}

async fn try_bind_on_port(family: BindFamily, port: u16) -> Result<BoundCallbackListener, String> {
    let mut bind_errors: Vec<String> = Vec::new();

    let listener_v4 = if family != BindFamily::V6 {
        match TcpListener::bind(("127.0.0.1", port)).await {
            Ok(listener) => Some(listener),
            Err(err) => {
                bind_errors.push(format!("127.0.0.1:{port} ({err})"));
                None
            }
        }
    } else {
        None
    };

    // An ephemeral v4 port is reused for v6 so both families share one redirect URI.
    let port = match (&listener_v4, port) {
        (Some(listener), 0) => listener
            .local_addr()
            .map_err(|e| format!("127.0.0.1:0 (local_addr failed: {e})"))?
            .port(),
        _ => port,
    };

    let listener_v6 = if family != BindFamily::V4 {
        match TcpListener::bind(("::1", port)).await {
            Ok(listener) => Some(listener),
            Err(err) => {
                bind_errors.push(format!("[::1]:{port} ({err})"));
                None
            }
        }
    } else {
        None
    };

    let port = match (&listener_v6, port) {
        (Some(listener), 0) => listener
            .local_addr()
            .map_err(|e| format!("[::1]:0 (local_addr failed: {e})"))?
            .port(),
        _ => port,
    };

    if listener_v4.is_none() && listener_v6.is_none() {
        return Err(bind_errors.join("; "));
    }

    Ok(BoundCallbackListener {
        port,
        listener_v4,
        listener_v6,
    })
}

/// Serves requests until one hits `expected_path`, then validates and returns its parameters.
/// Requests for other paths (a browser asking for `/favicon.ico`) get a 404 and are ignored.
pub(crate) async fn wait_for_callback(
    mut listener: BoundCallbackListener,
    expected_state: &str,
    expected_path: &str,
    timeout: Duration,
) -> AppResult<OAuthCallbackPayload> {
    let serve = async {
        loop {
            let mut socket = listener
                .accept()
                .await
                .map_err(|e| AppError::new(CODE_SYSTEM, format!("oauth callback accept failed: {e}")))?;

            let target = match read_request_target(&mut socket).await {
                Ok(target) => target,
                Err(err) => {
                    tracing::debug!("ignoring malformed callback request: {}", err);
                    respond(&mut socket, "400 Bad Request", ERROR_HTML).await;
                    continue;
                }
            };

            let url = match callback_url(&target) {
                Ok(url) if url.path() == expected_path => url,
                _ => {
                    respond(&mut socket, "404 Not Found", NOT_FOUND_HTML).await;
                    continue;
                }
            };

            let result = parse_callback_query(&url)
                .and_then(|payload| validate_state(&payload, expected_state).map(|_| payload));
            match &result {
                Ok(payload) if payload.error.is_none() => {
                    respond(&mut socket, "200 OK", SUCCESS_HTML).await
                }
                _ => respond(&mut socket, "400 Bad Request", ERROR_HTML).await,
            }
            return result;
        }
    };

    tokio::time::timeout(timeout, serve)
        .await
        .map_err(|_| "SYSTEM_ERROR: timed out waiting for the Spotify login callback".to_string())?
}

async fn read_request_target(socket: &mut TcpStream) -> AppResult<String> {
    let mut buffer = vec![0u8; 8192];
    let size = socket
        .read(&mut buffer)
        .await
        .map_err(|e| format!("SYSTEM_ERROR: oauth callback read failed: {e}"))?;
    if size == 0 {
        return Err("SYSTEM_ERROR: oauth callback request is empty".into());
    }
    let request = String::from_utf8_lossy(&buffer[..size]);
    extract_request_target(request.as_ref()).map(str::to_string)
}

async fn respond(socket: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn extract_request_target(request: &str) -> AppResult<&str> {
    let first = request
        .lines()
        .next()
        .ok_or_else(|| "SYSTEM_ERROR: oauth callback malformed request".to_string())?;
    let mut parts = first.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    if method != "GET" || target.is_empty() {
        return Err("SYSTEM_ERROR: oauth callback must be GET".into());
    }
    Ok(target)
}

fn callback_url(target: &str) -> AppResult<Url> {
    Url::parse(&format!("http://127.0.0.1{target}"))
        .map_err(|e| format!("SYSTEM_ERROR: invalid oauth callback target: {e}").into())
}

pub(crate) fn parse_callback_target(
    target: &str,
    expected_path: &str,
) -> AppResult<OAuthCallbackPayload> {
    let url = callback_url(target)?;
    if url.path() != expected_path {
        return Err("SYSTEM_ERROR: invalid oauth callback path".into());
    }
    parse_callback_query(&url)
}

fn parse_callback_query(url: &Url) -> AppResult<OAuthCallbackPayload> {
    let mut code: Option<String> = None;
    let mut state: Option<String> = None;
    let mut error: Option<String> = None;
    let mut error_description: Option<String> = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.to_string()),
            "state" => state = Some(value.to_string()),
            "error" => error = Some(value.to_string()),
            "error_description" => error_description = Some(value.to_string()),
            _ => {}
        }
    }

    if code.is_none() && error.is_none() {
        return Err("SYSTEM_ERROR: oauth callback missing code/error".into());
    }

    Ok(OAuthCallbackPayload {
        code,
        state,
        error,
        error_description,
    })
}

fn validate_state(payload: &OAuthCallbackPayload, expected_state: &str) -> AppResult<()> {
    let state = payload
        .state
        .as_deref()
        .ok_or_else(|| "SEC_INVALID_INPUT: oauth callback missing state".to_string())?;
    if !constant_time_eq(state.as_bytes(), expected_state.as_bytes()) {
        return Err("SEC_INVALID_INPUT: oauth callback state mismatch".into());
    }
    Ok(())
}
