//! HTTP route handlers for the address service.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                 - Liveness check
//! GET    /health/ready           - Readiness check (store + cache)
//!
//! # Addresses (require X-User-Id and X-Session-Id)
//! GET    /address                - All addresses (?limit=&offset=)
//! GET    /address/{type}         - all | billing | shipping | other
//! POST   /address                - Create (?default=1[&default_type=billing])
//! PUT    /address/{id}           - Update (?default=1[&default_type=billing])
//! PUT    /address/{id}/{type}    - Make default billing or shipping
//! DELETE /address/{id}           - Delete a non-default address
//! ```

pub mod addresses;
pub mod health;

use axum::{
    Router,
    routing::{get, put},
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::cache::CacheService;
use crate::db::AddressStore;
use crate::encryption::EncryptionGateway;
use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Create the address routes router.
pub fn address_routes<S, C, E>() -> Router<AppState<S, C, E>>
where
    S: AddressStore,
    C: CacheService,
    E: EncryptionGateway,
{
    Router::new()
        .route(
            "/",
            get(addresses::list_all::<S, C, E>).post(addresses::create::<S, C, E>),
        )
        // GET reads the segment as a list type, PUT and DELETE as an id.
        .route(
            "/{id}",
            get(addresses::list_by_type::<S, C, E>)
                .put(addresses::update::<S, C, E>)
                .delete(addresses::delete::<S, C, E>),
        )
        .route("/{id}/{type}", put(addresses::set_default::<S, C, E>))
}

/// Create the full application router with tracing and request ids.
pub fn router<S, C, E>(state: AppState<S, C, E>) -> Router
where
    S: AddressStore,
    C: CacheService,
    E: EncryptionGateway,
{
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness::<S, C, E>))
        .nest("/address", address_routes())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
