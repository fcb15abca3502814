//! Health check and API documentation routes.

use super::ApiState;
use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    uptime_seconds: i64,
}

/// Create the meta router
pub fn create_meta_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/docs", get(docs))
        .with_state(Arc::new(state))
}

/// GET /health
async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let now = Utc::now();
    Json(HealthResponse {
        status: "ok",
        timestamp: now.to_rfc3339(),
        uptime_seconds: (now - state.started_at).num_seconds(),
    })
}

/// GET /api/docs - JSON endpoint catalog
async fn docs() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "title": "Portico - Multi-User Google Services Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": {
                "POST /api/auth/start-auth": "Generate OAuth consent URL",
                "POST /api/auth/oauth-callback": "Exchange authorization code for tokens"
            },
            "gmail": {
                "POST /api/gmail/send-email": "Send email on behalf of user",
                "GET /api/gmail/list-emails": "List emails for user"
            },
            "sheets": {
                "GET /api/sheets/read-sheet": "Read a range from a spreadsheet",
                "POST /api/sheets/write-sheet": "Write a range to a spreadsheet"
            },
            "drive": {
                "POST /api/drive/upload-file": "Upload a file to Drive",
                "GET /api/drive/download-file": "Download a file from Drive"
            },
            "users": {
                "GET /api/users": "List authorized users",
                "DELETE /api/users/:userId": "Delete a user's stored credentials"
            }
        }
    }))
}
