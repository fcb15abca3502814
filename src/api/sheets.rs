//! Sheets pass-through endpoints.

use super::{authorized_client, ApiError, ApiState};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadSheetParams {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    spreadsheet_id: Option<String>,
    #[serde(default)]
    range: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadSheetResponse {
    success: bool,
    spreadsheet_id: String,
    range: Option<String>,
    values: Vec<Vec<serde_json::Value>>,
    row_count: usize,
    column_count: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteSheetRequest {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    spreadsheet_id: Option<String>,
    #[serde(default)]
    range: Option<String>,
    #[serde(default)]
    values: Option<serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WriteSheetResponse {
    success: bool,
    spreadsheet_id: String,
    range: Option<String>,
    updated_rows: Option<u64>,
    updated_columns: Option<u64>,
    updated_cells: Option<u64>,
}

/// Create the Sheets router
pub fn create_sheets_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/sheets/read-sheet", get(read_sheet))
        .route("/api/sheets/write-sheet", post(write_sheet))
        .with_state(Arc::new(state))
}

/// GET /api/sheets/read-sheet - Read one A1-style range
async fn read_sheet(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<ReadSheetParams>,
) -> Result<Json<ReadSheetResponse>, ApiError> {
    let (Some(user_id), Some(spreadsheet_id)) = (&params.user_id, &params.spreadsheet_id) else {
        return Err(ApiError::Validation(
            "Missing required fields: userId, spreadsheetId".to_string(),
        ));
    };
    let range = params.range.as_deref().unwrap_or("Sheet1");

    let client = authorized_client(&state, user_id).await?;

    let result = client
        .read_range(spreadsheet_id, range)
        .await
        .map_err(|e| ApiError::ExternalCall(e.to_string()))?;

    let row_count = result.values.len();
    let column_count = result.values.first().map(Vec::len).unwrap_or(0);

    Ok(Json(ReadSheetResponse {
        success: true,
        spreadsheet_id: spreadsheet_id.clone(),
        range: result.range,
        values: result.values,
        row_count,
        column_count,
    }))
}

/// POST /api/sheets/write-sheet - Write a 2-D block of values
async fn write_sheet(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<WriteSheetRequest>,
) -> Result<Json<WriteSheetResponse>, ApiError> {
    let (Some(user_id), Some(spreadsheet_id), Some(values)) =
        (&request.user_id, &request.spreadsheet_id, &request.values)
    else {
        return Err(ApiError::Validation(
            "Missing required fields: userId, spreadsheetId, values".to_string(),
        ));
    };
    let range = request.range.as_deref().unwrap_or("Sheet1!A1");

    let rows = parse_value_grid(values)?;

    let client = authorized_client(&state, user_id).await?;

    let result = client
        .write_range(spreadsheet_id, range, &rows)
        .await
        .map_err(|e| ApiError::ExternalCall(e.to_string()))?;

    info!(
        user_id = %user_id,
        spreadsheet_id = %spreadsheet_id,
        updated_cells = result.updated_cells.unwrap_or(0),
        "Sheet updated"
    );

    Ok(Json(WriteSheetResponse {
        success: true,
        spreadsheet_id: spreadsheet_id.clone(),
        range: result.updated_range,
        updated_rows: result.updated_rows,
        updated_columns: result.updated_columns,
        updated_cells: result.updated_cells,
    }))
}

/// Validate that `values` is an array of arrays and convert it.
fn parse_value_grid(values: &serde_json::Value) -> Result<Vec<Vec<serde_json::Value>>, ApiError> {
    let rows = values.as_array().ok_or_else(|| {
        ApiError::Validation("values must be an array of arrays (2D array)".to_string())
    })?;

    rows.iter()
        .map(|row| {
            row.as_array().cloned().ok_or_else(|| {
                ApiError::Validation("values must be an array of arrays (2D array)".to_string())
            })
        })
        .collect()
}
