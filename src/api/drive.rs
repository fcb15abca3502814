//! Drive pass-through endpoints.
//!
//! Upload reads a server-local file path (the service fronts trusted
//! automation, not arbitrary browsers); download either saves server-side
//! or streams the bytes back with the metadata headers.

use super::{authorized_client, ApiError, ApiState};
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::google::DriveFile;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileRequest {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    folder_id: Option<String>,
}

#[derive(Serialize)]
struct UploadFileResponse {
    success: bool,
    message: String,
    file: DriveFile,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadFileParams {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    file_id: Option<String>,
    #[serde(default)]
    output_path: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SavedFileResponse {
    success: bool,
    message: String,
    file: SavedFileInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SavedFileInfo {
    id: String,
    name: Option<String>,
    mime_type: Option<String>,
    size: Option<String>,
    saved_to: String,
}

/// Create the Drive router
pub fn create_drive_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/drive/upload-file", post(upload_file))
        .route("/api/drive/download-file", get(download_file))
        .with_state(Arc::new(state))
}

/// POST /api/drive/upload-file - Upload one server-local file
async fn upload_file(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<UploadFileRequest>,
) -> Result<Json<UploadFileResponse>, ApiError> {
    let (Some(user_id), Some(file_path)) = (&request.user_id, &request.file_path) else {
        return Err(ApiError::Validation(
            "Missing required fields: userId, filePath".to_string(),
        ));
    };

    let content = tokio::fs::read(file_path)
        .await
        .map_err(|e| ApiError::Validation(format!("File not found: {} ({})", file_path, e)))?;

    let file_name = match &request.file_name {
        Some(name) => name.clone(),
        None => Path::new(file_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.clone()),
    };
    let mime_type = request
        .mime_type
        .as_deref()
        .unwrap_or("application/octet-stream");

    let client = authorized_client(&state, user_id).await?;

    let file = client
        .upload_file(&file_name, mime_type, request.folder_id.as_deref(), &content)
        .await
        .map_err(|e| ApiError::ExternalCall(e.to_string()))?;

    info!(user_id = %user_id, file_id = %file.id, bytes = content.len(), "File uploaded");

    Ok(Json(UploadFileResponse {
        success: true,
        message: "File uploaded successfully".to_string(),
        file,
    }))
}

/// GET /api/drive/download-file - Fetch one file's metadata and bytes
async fn download_file(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<DownloadFileParams>,
) -> Result<Response, ApiError> {
    let (Some(user_id), Some(file_id)) = (&params.user_id, &params.file_id) else {
        return Err(ApiError::Validation(
            "Missing required fields: userId, fileId".to_string(),
        ));
    };

    let client = authorized_client(&state, user_id).await?;

    let metadata = client
        .file_metadata(file_id)
        .await
        .map_err(|e| ApiError::ExternalCall(e.to_string()))?;
    let bytes = client
        .download_file(file_id)
        .await
        .map_err(|e| ApiError::ExternalCall(e.to_string()))?;

    // Save server-side when requested, otherwise stream back to the caller
    if let Some(output_path) = &params.output_path {
        if let Some(parent) = Path::new(output_path).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ApiError::Internal(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(output_path, &bytes)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to write {}: {}", output_path, e)))?;

        info!(user_id = %user_id, file_id = %file_id, saved_to = %output_path, "File downloaded");

        return Ok(Json(SavedFileResponse {
            success: true,
            message: "File downloaded successfully".to_string(),
            file: SavedFileInfo {
                id: metadata.id,
                name: metadata.name,
                mime_type: metadata.mime_type,
                size: metadata.size,
                saved_to: output_path.clone(),
            },
        })
        .into_response());
    }

    let content_type = metadata
        .mime_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let disposition = format!(
        "attachment; filename=\"{}\"",
        metadata.name.as_deref().unwrap_or(file_id)
    );

    info!(user_id = %user_id, file_id = %file_id, bytes = bytes.len(), "File streamed");

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
