//! HTTP middleware and extractors.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors, added by the binary)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//!
//! Caller identity is an extractor ([`Customer`]) rather than a layer so
//! health probes stay unauthenticated.

pub mod customer;
pub mod request_id;

pub use customer::{Customer, SESSION_ID_HEADER, USER_ID_HEADER};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
