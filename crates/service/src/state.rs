//! Application state shared across handlers.

use crate::cache::MokaCacheService;
use crate::db::PgAddressStore;
use crate::encryption::HttpEncryptionGateway;
use crate::services::AddressListService;

/// Application state shared across all handlers.
///
/// Generic over the store, cache and gateway so the router can be served
/// against in-memory implementations in tests. Cheaply cloneable.
pub struct AppState<S, C, E> {
    addresses: AddressListService<S, C, E>,
}

/// State of the production binary.
pub type PgAppState = AppState<PgAddressStore, MokaCacheService, HttpEncryptionGateway>;

impl<S, C, E> Clone for AppState<S, C, E> {
    fn clone(&self) -> Self {
        Self {
            addresses: self.addresses.clone(),
        }
    }
}

impl<S, C, E> AppState<S, C, E> {
    #[must_use]
    pub const fn new(addresses: AddressListService<S, C, E>) -> Self {
        Self { addresses }
    }

    /// Get a reference to the address book operations.
    #[must_use]
    pub const fn addresses(&self) -> &AddressListService<S, C, E> {
        &self.addresses
    }
}
