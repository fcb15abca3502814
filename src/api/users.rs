//! Administrative user routes over the credential store.
//!
//! List and delete only; `clear` is deliberately not routable.

use super::{ApiError, ApiState};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{delete, get},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Serialize)]
struct ListUsersResponse {
    users: Vec<String>,
    count: usize,
}

#[derive(Serialize)]
struct DeleteUserResponse {
    success: bool,
    deleted: bool,
}

/// Create the user administration router
pub fn create_users_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/users", get(list_users))
        .route("/api/users/:user_id", delete(delete_user))
        .with_state(Arc::new(state))
}

/// GET /api/users - All authorized user identifiers
async fn list_users(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ListUsersResponse>, ApiError> {
    let users = state
        .store
        .list_users()
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(ListUsersResponse {
        count: users.len(),
        users,
    }))
}

/// DELETE /api/users/:user_id - Remove a user's stored credentials (logout)
async fn delete_user(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<String>,
) -> Result<Json<DeleteUserResponse>, ApiError> {
    let deleted = state
        .store
        .delete(&user_id)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    if deleted {
        info!(user_id = %user_id, "User credentials deleted");
    }

    Ok(Json(DeleteUserResponse {
        success: true,
        deleted,
    }))
}
