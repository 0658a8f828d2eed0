//! Usage: Setup wizard commands (credential status, validation, save, dashboard link, finish).

use crate::app::app_state::SpotifyState;
use crate::app::{login_task, overlay};
use crate::auth::endpoints::DEVELOPER_DASHBOARD_URL;
use crate::auth::token_exchange::{self, ClientAuth};
use crate::blocking;
use crate::infra::credentials::{self, Credentials, EnvOverrides};
use crate::shared::error::{AppError, CODE_SYSTEM};
use crate::shared::security::mask_token;
use tauri_plugin_opener::OpenerExt;

#[derive(Debug, Clone, serde::Serialize, specta::Type)]
pub(crate) struct SetupStatus {
    credentials_complete: bool,
    authenticated: bool,
    login_in_progress: bool,
    client_id: String,
    client_secret_masked: String,
    redirect_uri: String,
    public_client: bool,
    env_override: bool,
}

async fn status(state: &SpotifyState) -> SetupStatus {
    let creds = state.session().credentials().await;
    SetupStatus {
        credentials_complete: creds.is_complete(),
        authenticated: state.session().is_authenticated(),
        login_in_progress: state.login_in_progress(),
        client_id: creds.client_id.clone(),
        client_secret_masked: mask_token(&creds.client_secret),
        redirect_uri: creds.redirect_uri_or_default().to_string(),
        public_client: creds.public_client,
        env_override: !EnvOverrides::from_env().is_empty(),
    }
}

#[tauri::command]
#[specta::specta]
pub(crate) async fn setup_status(state: tauri::State<'_, SpotifyState>) -> Result<SetupStatus, String> {
    Ok(status(state.inner()).await)
}

/// Checks a client ID/secret pair with the client-credentials grant; no user consent involved.
#[tauri::command]
#[specta::specta]
pub(crate) async fn setup_validate_credentials(
    state: tauri::State<'_, SpotifyState>,
    client_id: String,
    client_secret: String,
) -> Result<bool, String> {
    let client_id = client_id.trim().to_string();
    let client_secret = client_secret.trim().to_string();
    if client_id.is_empty() || client_secret.is_empty() {
        return Err("SEC_INVALID_INPUT: client ID and client secret are required".to_string());
    }

    let session = state.session();
    let auth = ClientAuth::new(&client_id, Some(&client_secret));
    token_exchange::request_client_credentials(session.http(), &session.endpoints().token_url, &auth)
        .await?;
    tracing::info!(client_id = %client_id, "spotify credentials validated");
    Ok(true)
}

#[tauri::command]
#[specta::specta]
pub(crate) async fn setup_save_credentials(
    app: tauri::AppHandle,
    state: tauri::State<'_, SpotifyState>,
    client_id: String,
    client_secret: String,
    redirect_uri: Option<String>,
) -> Result<SetupStatus, String> {
    let public_client = client_secret.trim().is_empty();
    let input = Credentials {
        client_id,
        client_secret,
        redirect_uri: redirect_uri.unwrap_or_default(),
        public_client,
    };
    let app_for_work = app.clone();
    let saved = blocking::run("setup_save_credentials", move || {
        credentials::write(&app_for_work, &input)
    })
    .await?;

    // Environment values still take precedence over what was just stored.
    let effective = credentials::apply_env_overrides(saved, &EnvOverrides::from_env());
    state.session().set_credentials(effective).await?;
    Ok(status(state.inner()).await)
}

#[tauri::command]
#[specta::specta]
pub(crate) fn setup_open_dashboard(app: tauri::AppHandle) -> Result<bool, String> {
    app.opener()
        .open_url(DEVELOPER_DASHBOARD_URL, None::<&str>)
        .map_err(|e| AppError::new(CODE_SYSTEM, format!("failed to open dashboard: {e}")))?;
    Ok(true)
}

/// Closes the wizard, shows the overlay and starts a login when no tokens are stored.
#[tauri::command]
#[specta::specta]
pub(crate) async fn setup_finish(
    app: tauri::AppHandle,
    state: tauri::State<'_, SpotifyState>,
) -> Result<bool, String> {
    let creds = state.session().credentials().await;
    if !creds.is_complete() {
        return Err("CONFIG_MISSING: save your Spotify credentials before finishing setup".to_string());
    }
    overlay::show_overlay(&app)?;
    overlay::close_setup(&app)?;
    if !state.session().is_authenticated() {
        login_task::spawn_login(&app);
    }
    Ok(true)
}
