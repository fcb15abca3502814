//! API error taxonomy.
//!
//! Every failure becomes a structured JSON body with a short category
//! string plus the underlying message. Upstream Google errors are passed
//! through verbatim; nothing here retries or crashes the process.

use crate::credentials::StoreError;
use crate::google::RefreshError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

/// Application error types for all API endpoints
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed required input
    Validation(String),
    /// No stored credentials for the given user
    Unauthorized(String),
    /// Token update targeted a user that was never saved
    NoSuchUser(String),
    /// The external code exchange failed
    ExchangeFailed(String),
    /// The external token refresh failed
    RefreshFailed(String),
    /// Any other downstream API failure
    ExternalCall(String),
    /// Storage or IO failure on our side
    Internal(String),
}

impl ApiError {
    /// Short category string carried in every error body
    pub fn category(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::NoSuchUser(_) => "no_such_user",
            ApiError::ExchangeFailed(_) => "exchange_failed",
            ApiError::RefreshFailed(_) => "refresh_failed",
            ApiError::ExternalCall(_) => "external_call_failed",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NoSuchUser(_) => StatusCode::NOT_FOUND,
            ApiError::ExchangeFailed(_)
            | ApiError::RefreshFailed(_)
            | ApiError::ExternalCall(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::Validation(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::NoSuchUser(msg)
            | ApiError::ExchangeFailed(msg)
            | ApiError::RefreshFailed(msg)
            | ApiError::ExternalCall(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(category = self.category(), message = %self.message(), "Request failed");
        } else {
            tracing::debug!(category = self.category(), message = %self.message(), "Request rejected");
        }

        let body = Json(ErrorBody {
            error: self.category(),
            message: self.message().to_string(),
        });
        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NoSuchUser(user_id) => {
                ApiError::NoSuchUser(format!("No credentials found for user: {}", user_id))
            }
            StoreError::Backend(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<RefreshError> for ApiError {
    fn from(e: RefreshError) -> Self {
        match e {
            RefreshError::MissingRefreshToken | RefreshError::Upstream(_) => {
                ApiError::RefreshFailed(e.to_string())
            }
            RefreshError::Store(msg) => ApiError::Internal(msg),
        }
    }
}
