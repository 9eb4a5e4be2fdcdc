//! Caller identity extractor.
//!
//! The address service sits behind the platform gateway, which forwards the
//! authenticated customer as headers. Handlers take a [`Customer`] argument
//! to require them.

use std::sync::LazyLock;

use address_book_core::UserId;
use axum::{extract::FromRequestParts, http::request::Parts};
use regex::Regex;
use tracing::Span;

use crate::error::{AppError, set_sentry_user};

/// Header carrying the numeric customer id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the customer's session id.
pub const SESSION_ID_HEADER: &str = "x-session-id";

static SESSION_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9-]{20,}$").expect("Invalid regex"));

/// The customer a request acts for.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(customer: Customer) -> impl IntoResponse {
///     format!("addresses of {}", customer.user_id)
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub user_id: UserId,
    pub session_id: String,
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, AppError> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Unauthorized(format!("missing {name} header")))
}

impl<S> FromRequestParts<S> for Customer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)?
            .parse::<i32>()
            .ok()
            .filter(|id| *id > 0)
            .map(UserId::new)
            .ok_or_else(|| AppError::Unauthorized(format!("invalid {USER_ID_HEADER} header")))?;

        let session_id = header(parts, SESSION_ID_HEADER)?;
        if !SESSION_ID_RE.is_match(session_id) {
            return Err(AppError::Unauthorized(format!(
                "invalid {SESSION_ID_HEADER} header"
            )));
        }

        Span::current().record("user_id", user_id.as_i32());
        set_sentry_user(&user_id);

        Ok(Self {
            user_id,
            session_id: session_id.to_string(),
        })
    }
}
