//! OAuth flow endpoints.
//!
//! `start-auth` is pure URL construction; `oauth-callback` performs the
//! one external code-exchange call and persists the resulting bundle. A
//! missing `userId` on the callback gets a fresh UUIDv4 — collision odds
//! are negligible, so there is no exists-check or retry.

use super::{ApiError, ApiState};
use crate::credentials::CredentialBundle;
use crate::google::{self, DEFAULT_SCOPES};
use axum::{extract::State, response::Json, routing::post, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAuthRequest {
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    redirect_uri: Option<String>,
    #[serde(default)]
    scopes: Option<Vec<String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartAuthResponse {
    success: bool,
    auth_url: String,
    scopes: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthCallbackRequest {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    redirect_uri: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OAuthCallbackResponse {
    success: bool,
    user_id: String,
    message: String,
    token_info: TokenInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenInfo {
    expires_at: String,
    scopes: Vec<String>,
}

/// Create the auth flow router
pub fn create_auth_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/auth/start-auth", post(start_auth))
        .route("/api/auth/oauth-callback", post(oauth_callback))
        .with_state(Arc::new(state))
}

/// POST /api/auth/start-auth - Build the consent URL for the end-user
async fn start_auth(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<StartAuthRequest>,
) -> Result<Json<StartAuthResponse>, ApiError> {
    let (Some(client_id), Some(redirect_uri)) = (&request.client_id, &request.redirect_uri) else {
        return Err(ApiError::Validation(
            "Missing required fields: clientId, redirectUri".to_string(),
        ));
    };

    let scopes = request
        .scopes
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect());

    let auth_url = google::build_authorization_url(
        &state.endpoints.auth_url,
        client_id,
        redirect_uri,
        &scopes,
    )
    .map_err(|e| ApiError::Validation(e.to_string()))?;

    Ok(Json(StartAuthResponse {
        success: true,
        auth_url,
        scopes,
    }))
}

/// POST /api/auth/oauth-callback - Exchange the authorization code and save the bundle
async fn oauth_callback(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<OAuthCallbackRequest>,
) -> Result<Json<OAuthCallbackResponse>, ApiError> {
    let (Some(code), Some(client_id), Some(client_secret), Some(redirect_uri)) = (
        &request.code,
        &request.client_id,
        &request.client_secret,
        &request.redirect_uri,
    ) else {
        return Err(ApiError::Validation(
            "Missing required fields: code, clientId, clientSecret, redirectUri".to_string(),
        ));
    };

    let user_id = request
        .user_id
        .clone()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    // One exchange call; authorization codes are single-use, so no retry
    let tokens = google::exchange_code(
        &state.endpoints.token_url,
        code,
        client_id,
        client_secret,
        redirect_uri,
    )
    .await
    .map_err(|e| ApiError::ExchangeFailed(e.to_string()))?;

    let scopes = tokens.granted_scopes();
    let expires_at = tokens
        .expires_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string());

    let bundle = CredentialBundle {
        client_id: client_id.clone(),
        client_secret: client_secret.clone(),
        redirect_uri: redirect_uri.clone(),
        tokens,
    };
    state
        .store
        .save(&user_id, &bundle)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!(user_id = %user_id, scopes = scopes.len(), "OAuth flow completed");

    Ok(Json(OAuthCallbackResponse {
        success: true,
        user_id,
        message: "OAuth tokens saved successfully".to_string(),
        token_info: TokenInfo { expires_at, scopes },
    }))
}
