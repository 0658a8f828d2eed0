//! Usage: Spotify accounts / Web API endpoint constants and the overridable endpoint set.

pub(crate) const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
pub(crate) const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub(crate) const API_BASE_URL: &str = "https://api.spotify.com/v1";
pub(crate) const DEVELOPER_DASHBOARD_URL: &str = "https://developer.spotify.com/dashboard";
pub(crate) const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";
pub(crate) const SCOPES: &str = "user-read-playback-state user-modify-playback-state user-read-currently-playing playlist-read-private";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SpotifyEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub api_base_url: String,
    pub scopes: String,
}

impl Default for SpotifyEndpoints {
    fn default() -> Self {
        Self {
            authorize_url: AUTHORIZE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            api_base_url: API_BASE_URL.to_string(),
            scopes: SCOPES.to_string(),
        }
    }
}

impl SpotifyEndpoints {
    /// All three URLs rooted at a local fake server.
    #[cfg(test)]
    pub(crate) fn local(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorize_url: format!("{base}/authorize"),
            token_url: format!("{base}/api/token"),
            api_base_url: format!("{base}/v1"),
            scopes: SCOPES.to_string(),
        }
    }
}
