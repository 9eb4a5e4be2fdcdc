//! Database access for the address book.
//!
//! # Tables
//!
//! - `customer_address` - one row per address; phones are ciphertext
//! - `customer_address_region` - region lookup, each region belongs to a country
//! - `customer_additional_info` - per-user preferences (`sms_opt`)
//! - `country`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/service/migrations/` and run via:
//! ```bash
//! cargo run -p address-book-cli -- migrate
//! ```

mod addresses;

use std::future::Future;
use std::time::Duration;

use address_book_core::{AddressId, CountryId, DefaultFlags, DefaultRole, RegionId, UserId};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::{AddressRow, PgAddressStore, StoredAddress};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unknown region reference).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// A row of `customer_address_region`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Region {
    #[sqlx(rename = "id_customer_address_region")]
    pub id: RegionId,
    pub name: String,
    #[sqlx(rename = "fk_country")]
    pub country_id: CountryId,
}

/// Authoritative storage for addresses.
///
/// Every mutating method runs in its own transaction. Row counts are
/// returned so callers can tell "nothing matched" apart from success.
pub trait AddressStore: Send + Sync + 'static {
    /// Look up a region and the country it belongs to.
    fn find_region(
        &self,
        region: RegionId,
    ) -> impl Future<Output = Result<Option<Region>, RepositoryError>> + Send;

    /// Number of addresses `user` owns.
    fn count_addresses(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<i64, RepositoryError>> + Send;

    /// All addresses of `user`, joined with region and preferences.
    fn list_addresses(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<StoredAddress>, RepositoryError>> + Send;

    /// One address of `user`.
    fn find_address(
        &self,
        user: UserId,
        id: AddressId,
    ) -> impl Future<Output = Result<Option<StoredAddress>, RepositoryError>> + Send;

    /// Default-role flags of one address.
    fn default_flags(
        &self,
        user: UserId,
        id: AddressId,
    ) -> impl Future<Output = Result<Option<DefaultFlags>, RepositoryError>> + Send;

    /// Insert a new address and upsert the user's SMS preference.
    ///
    /// With `make_default` the row is created holding both default roles.
    fn insert_address(
        &self,
        user: UserId,
        row: &AddressRow,
        make_default: bool,
    ) -> impl Future<Output = Result<AddressId, RepositoryError>> + Send;

    /// Overwrite the mutable fields of an address and upsert the user's SMS
    /// preference. Returns the number of address rows matched.
    fn update_address(
        &self,
        user: UserId,
        id: AddressId,
        row: &AddressRow,
    ) -> impl Future<Output = Result<u64, RepositoryError>> + Send;

    /// Delete an address. Returns the number of rows removed.
    fn delete_address(
        &self,
        user: UserId,
        id: AddressId,
    ) -> impl Future<Output = Result<u64, RepositoryError>> + Send;

    /// Give `role` to `id` and take it away from every other address of
    /// `user`. Returns the number of rows that gained the role.
    fn set_default(
        &self,
        user: UserId,
        id: AddressId,
        role: DefaultRole,
    ) -> impl Future<Output = Result<u64, RepositoryError>> + Send;

    /// Cheap connectivity check for readiness probes.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
