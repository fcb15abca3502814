//! Gmail pass-through endpoints.

use super::{authorized_client, ApiError, ApiState};
use crate::google::{encode_message, OutgoingMail};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// List page size cap, matching the upstream maximum
const MAX_LIST_RESULTS: u32 = 100;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    html_body: Option<String>,
    #[serde(default)]
    text_body: Option<String>,
    #[serde(default)]
    cc: Option<String>,
    #[serde(default)]
    bcc: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailResponse {
    success: bool,
    message: String,
    message_id: String,
    thread_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEmailsParams {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    max_results: Option<u32>,
    #[serde(default)]
    query: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailSummary {
    id: String,
    thread_id: Option<String>,
    from: String,
    subject: String,
    date: String,
    snippet: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListEmailsResponse {
    success: bool,
    count: usize,
    emails: Vec<EmailSummary>,
    next_page_token: Option<String>,
}

/// Create the Gmail router
pub fn create_mail_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/gmail/send-email", post(send_email))
        .route("/api/gmail/list-emails", get(list_emails))
        .with_state(Arc::new(state))
}

/// POST /api/gmail/send-email - Send one message as the user
async fn send_email(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SendEmailRequest>,
) -> Result<Json<SendEmailResponse>, ApiError> {
    let (Some(user_id), Some(to), Some(subject)) =
        (&request.user_id, &request.to, &request.subject)
    else {
        return Err(ApiError::Validation(
            "Missing required fields: userId, to, subject".to_string(),
        ));
    };
    if request.html_body.is_none() && request.text_body.is_none() {
        return Err(ApiError::Validation(
            "Either htmlBody or textBody is required".to_string(),
        ));
    }

    let client = authorized_client(&state, user_id).await?;

    let raw = encode_message(&OutgoingMail {
        to,
        cc: request.cc.as_deref(),
        bcc: request.bcc.as_deref(),
        subject,
        html_body: request.html_body.as_deref(),
        text_body: request.text_body.as_deref(),
    });

    let sent = client
        .send_message(&raw)
        .await
        .map_err(|e| ApiError::ExternalCall(e.to_string()))?;

    info!(user_id = %user_id, message_id = %sent.id, "Email sent");

    Ok(Json(SendEmailResponse {
        success: true,
        message: "Email sent successfully".to_string(),
        message_id: sent.id,
        thread_id: sent.thread_id,
    }))
}

/// GET /api/gmail/list-emails - One page of message summaries
async fn list_emails(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<ListEmailsParams>,
) -> Result<Json<ListEmailsResponse>, ApiError> {
    let Some(user_id) = &params.user_id else {
        return Err(ApiError::Validation(
            "Missing required field: userId".to_string(),
        ));
    };

    let max_results = params.max_results.unwrap_or(10).min(MAX_LIST_RESULTS);
    let query = params.query.unwrap_or_default();

    let client = authorized_client(&state, user_id).await?;

    let list = client
        .list_messages(&query, max_results)
        .await
        .map_err(|e| ApiError::ExternalCall(e.to_string()))?;

    let mut emails = Vec::with_capacity(list.messages.len());
    for message in &list.messages {
        let meta = client
            .message_metadata(&message.id)
            .await
            .map_err(|e| ApiError::ExternalCall(e.to_string()))?;
        emails.push(EmailSummary {
            from: meta.header("From"),
            subject: meta.header("Subject"),
            date: meta.header("Date"),
            snippet: meta.snippet.unwrap_or_default(),
            id: meta.id,
            thread_id: meta.thread_id,
        });
    }

    Ok(Json(ListEmailsResponse {
        success: true,
        count: emails.len(),
        emails,
        next_page_token: list.next_page_token,
    }))
}
