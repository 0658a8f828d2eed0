//! Usage: Authenticated Spotify Web API client (player state, controls, queue, playlists).

use crate::auth::session::AuthSession;
use crate::shared::error::{
    AppError, AppResult, CODE_AUTH_REQUIRED, CODE_INVALID_INPUT, CODE_NO_ACTIVE_DEVICE,
    CODE_SPOTIFY_API,
};
use crate::spotify::models::{ApiErrorBody, Paging, PlaybackState, Queue, SimplifiedPlaylist};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

pub(crate) const MAX_PLAYLIST_LIMIT: u32 = 50;
const NO_ACTIVE_DEVICE_REASON: &str = "NO_ACTIVE_DEVICE";
const ERROR_MESSAGE_MAX_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub(crate) struct SpotifyClient {
    session: Arc<AuthSession>,
}

fn is_command_success(status: StatusCode) -> bool {
    matches!(status.as_u16(), 200 | 202 | 204)
}

/// Playlist IDs are base62; anything else would be spliced into a URI.
fn validate_playlist_id(playlist_id: &str) -> AppResult<&str> {
    let id = playlist_id.trim();
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::new(
            CODE_INVALID_INPUT,
            format!("invalid playlist id: {id:?}"),
        ));
    }
    Ok(id)
}

pub(crate) fn api_error(operation: &str, status: StatusCode, body: &str) -> AppError {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_default();

    let no_device = detail.reason.as_deref() == Some(NO_ACTIVE_DEVICE_REASON)
        || (status == StatusCode::NOT_FOUND
            && detail.message.to_ascii_lowercase().contains("no active device"));
    if no_device {
        return AppError::new(
            CODE_NO_ACTIVE_DEVICE,
            format!("{operation} failed: no active Spotify device"),
        );
    }
    if status == StatusCode::UNAUTHORIZED {
        return AppError::new(
            CODE_AUTH_REQUIRED,
            format!("{operation} failed: Spotify rejected the access token"),
        );
    }

    let message: String = if detail.message.is_empty() {
        status.canonical_reason().unwrap_or_default().to_string()
    } else {
        detail.message.chars().take(ERROR_MESSAGE_MAX_CHARS).collect()
    };
    AppError::new(
        CODE_SPOTIFY_API,
        format!("{operation} failed: {} {message}", status.as_u16()),
    )
}

impl SpotifyClient {
    pub(crate) fn new(session: Arc<AuthSession>) -> Self {
        Self { session }
    }

    pub(crate) fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    async fn send_once(
        &self,
        method: &Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        token: &str,
    ) -> AppResult<reqwest::Response> {
        let url = format!(
            "{}{path}",
            self.session.endpoints().api_base_url.trim_end_matches('/')
        );
        let mut request = self
            .session
            .http()
            .request(method.clone(), url)
            .bearer_auth(token)
            .query(query);
        request = match body {
            Some(body) => request.json(body),
            // Player endpoints reject body-less PUT/POST without an explicit length.
            None if *method != Method::GET => request.header(reqwest::header::CONTENT_LENGTH, "0"),
            None => request,
        };
        request
            .send()
            .await
            .map_err(|e| format!("SYSTEM_ERROR: spotify request {method} {path} failed: {e}").into())
    }

    /// Sends an authenticated request; a 401 triggers one token refresh and a single retry.
    pub(crate) async fn api_request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> AppResult<reqwest::Response> {
        let token = self.session.access_token().await?;
        let response = self.send_once(&method, path, query, body, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            self.session.note_token_accepted();
            return Ok(response);
        }

        tracing::debug!(path, "spotify api returned 401, refreshing token and retrying");
        let token = self.session.force_refresh(&token).await?;
        let response = self.send_once(&method, path, query, body, &token).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(self.session.reject_refreshed_token(&token).await);
        }
        self.session.note_token_accepted();
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> AppResult<Option<T>> {
        let response = self.api_request(Method::GET, path, query, None).await?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .map_err(|e| format!("SYSTEM_ERROR: {operation} response read failed: {e}"))?;
        if status != StatusCode::OK {
            return Err(api_error(operation, status, &body));
        }
        if body.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| format!("SPOTIFY_API_ERROR: {operation} returned invalid json: {e}").into())
    }

    async fn command(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> AppResult<()> {
        let response = self.api_request(method, path, query, body).await?;
        let status = response.status();
        if is_command_success(status) {
            tracing::debug!(operation, status = status.as_u16(), "spotify command ok");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(api_error(operation, status, &body))
    }

    /// `None` when nothing is playing on any device (HTTP 204).
    pub(crate) async fn current_playback(&self) -> AppResult<Option<PlaybackState>> {
        self.get_json("playback request", "/me/player", &[]).await
    }

    pub(crate) async fn queue(&self) -> AppResult<Queue> {
        Ok(self
            .get_json("queue request", "/me/player/queue", &[])
            .await?
            .unwrap_or_default())
    }

    pub(crate) async fn playlists(&self, limit: u32) -> AppResult<Paging<SimplifiedPlaylist>> {
        let limit = limit.clamp(1, MAX_PLAYLIST_LIMIT);
        Ok(self
            .get_json("playlists request", "/me/playlists", &[("limit", limit.to_string())])
            .await?
            .unwrap_or_default())
    }

    pub(crate) async fn play(&self) -> AppResult<()> {
        self.command("play", Method::PUT, "/me/player/play", &[], None)
            .await
    }

    pub(crate) async fn pause(&self) -> AppResult<()> {
        self.command("pause", Method::PUT, "/me/player/pause", &[], None)
            .await
    }

    pub(crate) async fn next_track(&self) -> AppResult<()> {
        self.command("next track", Method::POST, "/me/player/next", &[], None)
            .await
    }

    pub(crate) async fn previous_track(&self) -> AppResult<()> {
        self.command("previous track", Method::POST, "/me/player/previous", &[], None)
            .await
    }

    pub(crate) async fn play_playlist(&self, playlist_id: &str) -> AppResult<()> {
        let id = validate_playlist_id(playlist_id)?;
        let body = json!({ "context_uri": format!("spotify:playlist:{id}") });
        self.command("play playlist", Method::PUT, "/me/player/play", &[], Some(&body))
            .await
    }

    pub(crate) async fn set_volume(&self, percent: u32) -> AppResult<()> {
        let percent = percent.min(100);
        self.command(
            "set volume",
            Method::PUT,
            "/me/player/volume",
            &[("volume_percent", percent.to_string())],
            None,
        )
        .await
    }

    /// Pauses when playing, otherwise resumes; returns the intended `is_playing`.
    pub(crate) async fn toggle_playback(&self) -> AppResult<bool> {
        let playing = self
            .current_playback()
            .await?
            .is_some_and(|state| state.is_playing);
        if playing {
            self.pause().await?;
        } else {
            self.play().await?;
        }
        Ok(!playing)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::endpoints::SpotifyEndpoints;
    use crate::auth::session::tests::{test_credentials, MemorySink};
    use crate::infra::token_store::StoredTokens;
    use crate::shared::error::CODE_AUTH_RELOGIN_REQUIRED;
    use crate::shared::mutex_ext::MutexExt;
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct FakePlayer {
        pub(crate) playing: bool,
        pub(crate) nothing_playing: bool,
        pub(crate) no_device: bool,
        pub(crate) calls: Vec<String>,
        pub(crate) refreshes: usize,
        pub(crate) refresh_issues_revoked_token: bool,
    }

    pub(crate) type SharedPlayer = Arc<Mutex<FakePlayer>>;

    const VALID_TOKEN: &str = "fresh-token";

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == format!("Bearer {VALID_TOKEN}"))
    }

    fn no_device() -> Response {
        (
            AxumStatus::NOT_FOUND,
            Json(json!({"error": {"status": 404, "message": "Player command failed: No active device found", "reason": "NO_ACTIVE_DEVICE"}})),
        )
            .into_response()
    }

    fn unauthorized() -> Response {
        (
            AxumStatus::UNAUTHORIZED,
            Json(json!({"error": {"status": 401, "message": "The access token expired"}})),
        )
            .into_response()
    }

    async fn player_state(State(s): State<SharedPlayer>, headers: HeaderMap) -> Response {
        if !authorized(&headers) {
            return unauthorized();
        }
        let s = s.lock_or_recover();
        if s.nothing_playing {
            return AxumStatus::NO_CONTENT.into_response();
        }
        Json(json!({
            "is_playing": s.playing,
            "device": {"id": "d1", "name": "Desk", "is_active": true, "volume_percent": 55},
            "item": {
                "id": "t1",
                "name": "A Remarkably Long Song Title That Keeps Going",
                "artists": [{"name": "First"}, {"name": "Second"}],
                "album": {"name": "LP", "images": [{"url": "https://img/640"}]},
                "duration_ms": 200000
            }
        }))
        .into_response()
    }

    fn record(s: &SharedPlayer, headers: &HeaderMap, call: String) -> Response {
        if !authorized(headers) {
            return unauthorized();
        }
        let mut s = s.lock_or_recover();
        if s.no_device {
            return no_device();
        }
        s.calls.push(call);
        AxumStatus::NO_CONTENT.into_response()
    }

    pub(crate) async fn spawn_fake_spotify(player: SharedPlayer) -> String {
        let app = Router::new()
            .route("/v1/me/player", get(player_state))
            .route(
                "/v1/me/player/play",
                put(
                    |State(s): State<SharedPlayer>, headers: HeaderMap, body: String| async move {
                        let call = if body.is_empty() { "play".to_string() } else { format!("play {body}") };
                        let out = record(&s, &headers, call);
                        if out.status() == AxumStatus::NO_CONTENT {
                            s.lock_or_recover().playing = true;
                        }
                        out
                    },
                ),
            )
            .route(
                "/v1/me/player/pause",
                put(|State(s): State<SharedPlayer>, headers: HeaderMap| async move {
                    let out = record(&s, &headers, "pause".to_string());
                    if out.status() == AxumStatus::NO_CONTENT {
                        s.lock_or_recover().playing = false;
                    }
                    out
                }),
            )
            .route(
                "/v1/me/player/next",
                post(|State(s): State<SharedPlayer>, headers: HeaderMap| async move {
                    record(&s, &headers, "next".to_string())
                }),
            )
            .route(
                "/v1/me/player/previous",
                post(|State(s): State<SharedPlayer>, headers: HeaderMap| async move {
                    record(&s, &headers, "previous".to_string())
                }),
            )
            .route(
                "/v1/me/player/volume",
                put(
                    |State(s): State<SharedPlayer>,
                     headers: HeaderMap,
                     Query(q): Query<HashMap<String, String>>| async move {
                        let v = q.get("volume_percent").cloned().unwrap_or_default();
                        record(&s, &headers, format!("volume {v}"))
                    },
                ),
            )
            .route(
                "/v1/me/player/queue",
                get(|headers: HeaderMap| async move {
                    if !authorized(&headers) {
                        return unauthorized();
                    }
                    let queue: Vec<Value> = (1..=12)
                        .map(|n| json!({"name": format!("Next {n}"), "artists": [{"name": "Band"}]}))
                        .collect();
                    Json(json!({"currently_playing": null, "queue": queue})).into_response()
                }),
            )
            .route(
                "/v1/me/playlists",
                get(|headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                    if !authorized(&headers) {
                        return unauthorized();
                    }
                    let limit: usize = q.get("limit").and_then(|l| l.parse().ok()).unwrap_or(20);
                    let items: Vec<Value> = (1..=limit.min(3))
                        .map(|n| json!({"id": format!("pl{n}"), "name": format!("Mix {n}"), "images": null, "tracks": {"total": n * 10}}))
                        .collect();
                    Json(json!({"items": items, "total": 3, "limit": limit})).into_response()
                }),
            )
            .route(
                "/api/token",
                post(|State(s): State<SharedPlayer>| async move {
                    let mut s = s.lock_or_recover();
                    s.refreshes += 1;
                    let token = if s.refresh_issues_revoked_token { "revoked-by-server" } else { VALID_TOKEN };
                    Json(json!({"access_token": token, "expires_in": 3600}))
                }),
            )
            .with_state(player);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    /// Client whose stored access token is rejected until refreshed.
    pub(crate) async fn client_with_stale_token() -> (SpotifyClient, SharedPlayer) {
        let player: SharedPlayer = Arc::default();
        let base = spawn_fake_spotify(Arc::clone(&player)).await;
        let session = AuthSession::new(
            reqwest::Client::new(),
            SpotifyEndpoints::local(&base),
            test_credentials(),
            Some(StoredTokens {
                access_token: "revoked-by-server".to_string(),
                refresh_token: Some("refresh".to_string()),
                expires_at: Some(i64::MAX),
            }),
            Arc::new(MemorySink::default()),
        );
        (SpotifyClient::new(Arc::new(session)), player)
    }

    #[test]
    fn playlist_id_must_be_base62() {
        assert_eq!(validate_playlist_id(" 37i9dQZF1DXcBWIGoYBM5M ").expect("ok"), "37i9dQZF1DXcBWIGoYBM5M");
        assert!(validate_playlist_id("").is_err());
        assert!(validate_playlist_id("abc/../me").is_err());
    }

    #[test]
    fn api_error_maps_no_active_device() {
        let body = r#"{"error":{"status":404,"message":"Player command failed: No active device found","reason":"NO_ACTIVE_DEVICE"}}"#;
        let err = api_error("play", StatusCode::NOT_FOUND, body);
        assert_eq!(err.code(), CODE_NO_ACTIVE_DEVICE);

        let err = api_error("pause", StatusCode::FORBIDDEN, r#"{"error":{"status":403,"message":"Player command failed: Premium required"}}"#);
        assert_eq!(err.code(), CODE_SPOTIFY_API);
        assert_eq!(err.message(), "pause failed: 403 Player command failed: Premium required");
    }

    #[tokio::test]
    async fn unauthorized_request_refreshes_once_and_retries() {
        let (client, player) = client_with_stale_token().await;
        let state = client.current_playback().await.expect("playback").expect("some");
        assert_eq!(state.device.map(|d| d.name).as_deref(), Some("Desk"));
        assert_eq!(player.lock_or_recover().refreshes, 1);

        client.current_playback().await.expect("second call");
        assert_eq!(player.lock_or_recover().refreshes, 1);
    }

    #[tokio::test]
    async fn repeatedly_rejected_refresh_ends_the_session() {
        let (client, player) = client_with_stale_token().await;
        player.lock_or_recover().refresh_issues_revoked_token = true;

        let err = client.current_playback().await.expect_err("first rejection");
        assert_eq!(err.code(), CODE_AUTH_REQUIRED);
        assert!(client.session().is_authenticated());

        let err = client.current_playback().await.expect_err("second rejection");
        assert_eq!(err.code(), CODE_AUTH_RELOGIN_REQUIRED);
        assert!(!client.session().is_authenticated());
        assert_eq!(player.lock_or_recover().refreshes, 2);

        // Logged out now: no further refresh attempts.
        let err = client.current_playback().await.expect_err("logged out");
        assert_eq!(err.code(), CODE_AUTH_REQUIRED);
        assert_eq!(player.lock_or_recover().refreshes, 2);
    }

    #[tokio::test]
    async fn accepted_token_resets_the_rejection_streak() {
        let (client, player) = client_with_stale_token().await;
        player.lock_or_recover().refresh_issues_revoked_token = true;
        client.current_playback().await.expect_err("rejected once");

        player.lock_or_recover().refresh_issues_revoked_token = false;
        client.current_playback().await.expect("recovered");

        player.lock_or_recover().refresh_issues_revoked_token = true;
        client.session().force_refresh(VALID_TOKEN).await.expect("refresh to revoked");
        let err = client.current_playback().await.expect_err("rejected again");
        assert_eq!(err.code(), CODE_AUTH_REQUIRED);
        assert!(client.session().is_authenticated());
    }

    #[tokio::test]
    async fn no_content_means_nothing_playing() {
        let (client, player) = client_with_stale_token().await;
        player.lock_or_recover().nothing_playing = true;
        assert!(client.current_playback().await.expect("ok").is_none());
    }

    #[tokio::test]
    async fn toggle_pauses_when_playing_and_plays_otherwise() {
        let (client, player) = client_with_stale_token().await;
        player.lock_or_recover().playing = true;
        assert!(!client.toggle_playback().await.expect("toggle"));
        assert!(client.toggle_playback().await.expect("toggle"));
        assert_eq!(player.lock_or_recover().calls, vec!["pause", "play"]);
    }

    #[tokio::test]
    async fn toggle_with_nothing_playing_resumes() {
        let (client, player) = client_with_stale_token().await;
        player.lock_or_recover().nothing_playing = true;
        assert!(client.toggle_playback().await.expect("toggle"));
        assert_eq!(player.lock_or_recover().calls, vec!["play"]);
    }

    #[tokio::test]
    async fn commands_without_device_map_to_no_active_device() {
        let (client, player) = client_with_stale_token().await;
        player.lock_or_recover().no_device = true;
        let err = client.next_track().await.expect_err("no device");
        assert_eq!(err.code(), CODE_NO_ACTIVE_DEVICE);
    }

    #[tokio::test]
    async fn play_playlist_sends_context_uri_and_volume_is_clamped() {
        let (client, player) = client_with_stale_token().await;
        client.play_playlist("pl1").await.expect("play playlist");
        client.set_volume(150).await.expect("volume");
        client.previous_track().await.expect("previous");
        let calls = player.lock_or_recover().calls.clone();
        assert_eq!(calls[0], r#"play {"context_uri":"spotify:playlist:pl1"}"#);
        assert_eq!(calls[1], "volume 100");
        assert_eq!(calls[2], "previous");
    }

    #[tokio::test]
    async fn queue_and_playlists_parse() {
        let (client, _) = client_with_stale_token().await;
        assert_eq!(client.queue().await.expect("queue").queue.len(), 12);
        let page = client.playlists(0).await.expect("playlists");
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "pl1");
    }
}
