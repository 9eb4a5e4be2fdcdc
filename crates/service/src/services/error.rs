//! Errors returned by the address-book operations.

use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::encryption::EncryptionError;

/// A problem with one request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Errors from [`AddressListService`](super::AddressListService).
#[derive(Debug, Error)]
pub enum AddressError {
    /// One or more request fields were missing or malformed.
    #[error("validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    /// The address does not exist or belongs to another user.
    #[error("address not found")]
    NotFound,

    /// The operation would break a default-address rule.
    #[error("{0}")]
    Conflict(String),

    /// The encryption gateway failed.
    #[error("encryption gateway error: {0}")]
    Upstream(#[from] EncryptionError),

    /// The store rejected the write or could not be reached.
    #[error("store error: {0}")]
    Store(#[from] RepositoryError),

    /// A background task ended without reporting back.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AddressError {
    /// Single-field validation error.
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display_lists_fields() {
        let err = AddressError::Validation(vec![
            FieldError::new("postcode", "must be 6 digits"),
            FieldError::new("city", "is required"),
        ]);
        assert_eq!(
            err.to_string(),
            "validation failed: postcode: must be 6 digits; city: is required"
        );
    }

    #[test]
    fn test_conflict_display_is_the_message() {
        let err = AddressError::Conflict("Cannot delete default billing address".to_owned());
        assert_eq!(err.to_string(), "Cannot delete default billing address");
    }
}
