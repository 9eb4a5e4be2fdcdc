//! Liveness and readiness probes.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use tracing::warn;

use crate::cache::CacheService;
use crate::db::AddressStore;
use crate::encryption::EncryptionGateway;
use crate::state::AppState;

/// Per-dependency readiness.
#[derive(Debug, Serialize)]
pub struct Readiness {
    store: bool,
    cache: bool,
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable unless both the store and the cache
/// answer.
pub async fn readiness<S, C, E>(
    State(state): State<AppState<S, C, E>>,
) -> (StatusCode, Json<Readiness>)
where
    S: AddressStore,
    C: CacheService,
    E: EncryptionGateway,
{
    let service = state.addresses();

    let store = match service.store().ping().await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "Store readiness check failed");
            false
        }
    };

    let cache = match service.cache().health_check().await {
        Ok(healthy) => healthy,
        Err(err) => {
            warn!(provider = service.cache().provider_name(), error = %err, "Cache readiness check failed");
            false
        }
    };

    let status = if store && cache {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(Readiness { store, cache }))
}
