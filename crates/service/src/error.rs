//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::{AddressError, FieldError};

/// Application-level error type for the address service.
#[derive(Debug, Error)]
pub enum AppError {
    /// An address operation failed.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Caller identity headers are missing or malformed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Internal(_)
                | Self::Address(
                    AddressError::Store(_) | AddressError::Upstream(_) | AddressError::Internal(_)
                )
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Address(err) => match err {
                AddressError::Validation(_) => StatusCode::BAD_REQUEST,
                AddressError::NotFound => StatusCode::NOT_FOUND,
                AddressError::Conflict(_) => StatusCode::CONFLICT,
                AddressError::Upstream(_) => StatusCode::BAD_GATEWAY,
                AddressError::Store(_) | AddressError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();

        // Don't expose internal error details to clients
        let (message, fields): (String, &[FieldError]) = match &self {
            Self::Address(AddressError::Validation(errors)) => {
                ("Invalid request".to_string(), errors.as_slice())
            }
            Self::Address(AddressError::Upstream(_)) => ("External service error".to_string(), &[]),
            Self::Address(AddressError::Store(_) | AddressError::Internal(_)) | Self::Internal(_) => {
                ("Internal server error".to_string(), &[])
            }
            _ => (self.to_string(), &[]),
        };

        let body = if fields.is_empty() {
            json!({ "error": { "message": message } })
        } else {
            json!({ "error": { "message": message, "fields": fields } })
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the current request.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}
