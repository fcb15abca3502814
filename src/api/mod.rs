// HTTP API: auth flow, domain pass-throughs, admin and meta routes

pub mod auth;
pub mod drive;
pub mod error;
pub mod mail;
pub mod meta;
pub mod sheets;
pub mod users;

pub use auth::create_auth_router;
pub use drive::create_drive_router;
pub use error::ApiError;
pub use mail::create_mail_router;
pub use meta::create_meta_router;
pub use sheets::create_sheets_router;
pub use users::create_users_router;

use crate::credentials::{CredentialStore, StoredBundle};
use crate::google::{self, GoogleClient, GoogleEndpoints};
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Shared application state for all API routers
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<CredentialStore>,
    pub endpoints: GoogleEndpoints,
    pub started_at: DateTime<Utc>,
}

impl ApiState {
    pub fn new(store: Arc<CredentialStore>, endpoints: GoogleEndpoints) -> Self {
        Self {
            store,
            endpoints,
            started_at: Utc::now(),
        }
    }
}

/// Create the full API router with every endpoint group mounted
pub fn create_api_router(state: ApiState) -> Router {
    Router::new()
        .merge(create_auth_router(state.clone()))
        .merge(create_mail_router(state.clone()))
        .merge(create_sheets_router(state.clone()))
        .merge(create_drive_router(state.clone()))
        .merge(create_users_router(state.clone()))
        .merge(create_meta_router(state))
}

/// Look up a user's stored bundle, failing with `Unauthorized` when absent.
///
/// Runs before any external call; an unknown user never reaches Google.
pub(crate) fn require_bundle(state: &ApiState, user_id: &str) -> Result<StoredBundle, ApiError> {
    if user_id.is_empty() {
        return Err(ApiError::Validation(
            "Missing required field: userId".to_string(),
        ));
    }

    match state.store.get(user_id) {
        Ok(Some(bundle)) => Ok(bundle),
        Ok(None) => {
            tracing::debug!(user_id = %user_id, "No stored credentials");
            Err(ApiError::Unauthorized(
                "User not authorized. Please complete the OAuth flow first.".to_string(),
            ))
        }
        Err(e) => Err(ApiError::Internal(e.to_string())),
    }
}

/// Build an authenticated Google client for a user, refreshing the access
/// token first when it is about to expire.
pub(crate) async fn authorized_client(
    state: &ApiState,
    user_id: &str,
) -> Result<GoogleClient, ApiError> {
    let bundle = require_bundle(state, user_id)?;
    let access_token = google::fresh_access_token(
        &state.store,
        &state.endpoints.token_url,
        user_id,
        &bundle,
    )
    .await?;
    Ok(GoogleClient::new(access_token, state.endpoints.clone()))
}
