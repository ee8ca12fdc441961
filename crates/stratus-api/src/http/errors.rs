//! API error wrapper producing the `{"error": "<message>"}` envelope.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use stratus_sync::SyncError;

use crate::models::ErrorResponse;

/// Handler-level error carrying the status and the caller-visible message.
#[derive(Debug)]
pub struct ApiError {
    pub(crate) status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub(crate) fn timed_out() -> Self {
        Self::internal("operation timed out")
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match &err {
            SyncError::ProjectNotFound { .. } => Self::not_found(err.to_string()),
            SyncError::Conflict { .. } | SyncError::DeltaBaseMismatch { .. } => {
                Self::conflict(err.to_string())
            }
            _ => Self::internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}
