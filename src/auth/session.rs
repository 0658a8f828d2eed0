//! Usage: Spotify OAuth session (credentials + tokens, lazy refresh serialized behind an async mutex).

use crate::auth::endpoints::SpotifyEndpoints;
use crate::auth::token_exchange::{self, ClientAuth, OAuthTokenSet};
use crate::blocking;
use crate::infra::credentials::Credentials;
use crate::infra::token_store::{StoredTokens, TokenSink};
use crate::shared::error::{
    AppError, AppResult, CODE_AUTH_INVALID_CREDENTIALS, CODE_AUTH_RELOGIN_REQUIRED,
    CODE_AUTH_REQUIRED, CODE_CONFIG_MISSING,
};
use crate::shared::time::now_unix_seconds;
use reqwest::Url;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Freshly refreshed tokens rejected this many times in a row end the session.
pub(crate) const MAX_REJECTED_REFRESHES: u32 = 2;

struct SessionInner {
    credentials: Credentials,
    tokens: Option<StoredTokens>,
}

pub(crate) struct AuthSession {
    http: reqwest::Client,
    endpoints: SpotifyEndpoints,
    inner: Mutex<SessionInner>,
    sink: Arc<dyn TokenSink>,
    authenticated: AtomicBool,
    rejected_refreshes: AtomicU32,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("endpoints", &self.endpoints)
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

fn auth_required(message: &str) -> AppError {
    AppError::new(CODE_AUTH_REQUIRED, message)
}

pub(crate) fn client_auth(credentials: &Credentials) -> AppResult<ClientAuth> {
    if !credentials.is_complete() {
        return Err(AppError::new(
            CODE_CONFIG_MISSING,
            "Spotify client ID and secret are not configured",
        ));
    }
    Ok(ClientAuth::new(&credentials.client_id, credentials.secret()))
}

/// Authorization URL for the consent page; `challenge` is set for public clients only.
pub(crate) fn build_authorize_url(
    endpoints: &SpotifyEndpoints,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
    challenge: Option<&str>,
) -> AppResult<String> {
    let mut url = Url::parse(&endpoints.authorize_url)
        .map_err(|e| format!("SYSTEM_ERROR: invalid authorize url: {e}"))?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", client_id.trim())
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &endpoints.scopes)
            .append_pair("state", state)
            .append_pair("show_dialog", "true");
        if let Some(challenge) = challenge {
            query
                .append_pair("code_challenge_method", "S256")
                .append_pair("code_challenge", challenge);
        }
    }
    Ok(url.into())
}

/// Merges a token endpoint response into the stored set, keeping the old refresh token
/// when Spotify omits a rotated one.
fn merge_tokens(previous: Option<&StoredTokens>, set: OAuthTokenSet) -> StoredTokens {
    let refresh_token = set
        .refresh_token
        .or_else(|| previous.and_then(|t| t.refresh_token.clone()));
    StoredTokens {
        access_token: set.access_token,
        refresh_token,
        expires_at: Some(set.expires_at),
    }
}

impl AuthSession {
    pub(crate) fn new(
        http: reqwest::Client,
        endpoints: SpotifyEndpoints,
        credentials: Credentials,
        tokens: Option<StoredTokens>,
        sink: Arc<dyn TokenSink>,
    ) -> Self {
        let authenticated = tokens.is_some();
        Self {
            http,
            endpoints,
            inner: Mutex::new(SessionInner {
                credentials,
                tokens,
            }),
            sink,
            authenticated: AtomicBool::new(authenticated),
            rejected_refreshes: AtomicU32::new(0),
        }
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn endpoints(&self) -> &SpotifyEndpoints {
        &self.endpoints
    }

    /// Tokens are present; they may still need a refresh.
    pub(crate) fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    pub(crate) async fn credentials(&self) -> Credentials {
        self.inner.lock().await.credentials.clone()
    }

    /// Replaces credentials; tokens issued to another client ID are dropped.
    pub(crate) async fn set_credentials(&self, credentials: Credentials) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let client_changed = inner.credentials.client_id.trim() != credentials.client_id.trim();
        inner.credentials = credentials;
        if client_changed && inner.tokens.is_some() {
            tracing::info!("spotify client id changed, discarding tokens");
            self.clear_locked(&mut inner).await?;
        }
        Ok(())
    }

    pub(crate) async fn complete_login(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let auth = client_auth(&inner.credentials)?;
        let set = token_exchange::exchange_authorization_code(
            &self.http,
            &self.endpoints.token_url,
            &auth,
            code,
            redirect_uri,
            code_verifier,
        )
        .await?;
        let tokens = merge_tokens(None, set);
        self.store_locked(&mut inner, tokens).await;
        tracing::info!("spotify login completed");
        Ok(())
    }

    /// A usable access token, refreshing first when the stored one has expired.
    pub(crate) async fn access_token(&self) -> AppResult<String> {
        let mut inner = self.inner.lock().await;
        let valid = match inner.tokens.as_ref() {
            None => return Err(auth_required("not logged in to Spotify")),
            Some(tokens) if !tokens.is_expired(now_unix_seconds()) => {
                Some(tokens.access_token.clone())
            }
            Some(_) => None,
        };
        match valid {
            Some(token) => Ok(token),
            None => self.refresh_locked(&mut inner).await,
        }
    }

    /// Refresh after the API rejected `stale_token`; a no-op when another caller already did.
    pub(crate) async fn force_refresh(&self, stale_token: &str) -> AppResult<String> {
        let mut inner = self.inner.lock().await;
        let current = inner.tokens.as_ref().map(|t| t.access_token.clone());
        match current {
            None => Err(auth_required("not logged in to Spotify")),
            Some(token) if token != stale_token => Ok(token),
            Some(_) => self.refresh_locked(&mut inner).await,
        }
    }

    /// The API accepted a token; resets the rejected-refresh streak.
    pub(crate) fn note_token_accepted(&self) {
        self.rejected_refreshes.store(0, Ordering::Release);
    }

    /// The API rejected `token` right after it was refreshed. After
    /// `MAX_REJECTED_REFRESHES` such rejections in a row the tokens are dropped, so pollers
    /// stop refreshing and the user is asked to log in again.
    pub(crate) async fn reject_refreshed_token(&self, token: &str) -> AppError {
        let streak = self.rejected_refreshes.fetch_add(1, Ordering::AcqRel) + 1;
        if streak < MAX_REJECTED_REFRESHES {
            tracing::warn!(streak, "spotify rejected a freshly refreshed access token");
            return auth_required("Spotify rejected the refreshed access token");
        }

        let mut inner = self.inner.lock().await;
        let still_current = inner.tokens.as_ref().is_some_and(|t| t.access_token == token);
        if still_current {
            tracing::warn!(streak, "spotify keeps rejecting refreshed tokens, clearing session");
            if let Err(err) = self.clear_locked(&mut inner).await {
                tracing::warn!("failed to clear rejected spotify tokens: {}", err);
            }
        }
        self.rejected_refreshes.store(0, Ordering::Release);
        AppError::new(
            CODE_AUTH_RELOGIN_REQUIRED,
            "Spotify keeps rejecting the access token; please log in again",
        )
    }

    pub(crate) async fn logout(&self) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        self.clear_locked(&mut inner).await?;
        tracing::info!("spotify logout");
        Ok(())
    }

    async fn refresh_locked(&self, inner: &mut SessionInner) -> AppResult<String> {
        let refresh_token = inner
            .tokens
            .as_ref()
            .filter(|t| t.has_refresh_token())
            .and_then(|t| t.refresh_token.clone());
        let Some(refresh_token) = refresh_token else {
            self.clear_locked(inner).await?;
            return Err(auth_required("Spotify session expired; please log in again"));
        };

        let auth = client_auth(&inner.credentials)?;
        match token_exchange::refresh_access_token(
            &self.http,
            &self.endpoints.token_url,
            &auth,
            &refresh_token,
        )
        .await
        {
            Ok(set) => {
                let tokens = merge_tokens(inner.tokens.as_ref(), set);
                let access_token = tokens.access_token.clone();
                self.store_locked(inner, tokens).await;
                tracing::debug!("spotify access token refreshed");
                Ok(access_token)
            }
            Err(err)
                if err.is(CODE_AUTH_RELOGIN_REQUIRED) || err.is(CODE_AUTH_INVALID_CREDENTIALS) =>
            {
                tracing::warn!("spotify token refresh rejected, clearing tokens: {}", err);
                self.clear_locked(inner).await?;
                Err(auth_required("Spotify session expired; please log in again"))
            }
            Err(err) => {
                tracing::warn!("spotify token refresh failed: {}", err);
                Err(err)
            }
        }
    }

    async fn store_locked(&self, inner: &mut SessionInner, tokens: StoredTokens) {
        inner.tokens = Some(tokens.clone());
        self.authenticated.store(true, Ordering::Release);

        let sink = Arc::clone(&self.sink);
        // In-memory tokens stay valid for this run even if persisting fails.
        if let Err(err) = blocking::run("token_store_save", move || sink.save(&tokens)).await {
            tracing::warn!("failed to persist spotify tokens: {}", err);
        }
    }

    async fn clear_locked(&self, inner: &mut SessionInner) -> AppResult<()> {
        inner.tokens = None;
        self.authenticated.store(false, Ordering::Release);

        let sink = Arc::clone(&self.sink);
        blocking::run("token_store_clear", move || sink.clear()).await
    }
}
