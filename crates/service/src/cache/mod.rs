//! Key/value cache in front of the address store.
//!
//! The cache only ever holds derived data: every entry can be rebuilt from
//! the store, so cache failures are logged and otherwise ignored by callers.
//!
//! - [`CacheService`] - async get/set/delete seam
//! - [`MokaCacheService`] - in-process implementation with per-entry TTL
//! - [`address_list`] - the per-user cached address list and its key

pub mod address_list;

use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

pub use address_list::{CachedAddressList, address_list_key};

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to reach the cache backend.
    #[error("cache connection error: {0}")]
    ConnectionError(String),

    /// Failed to serialize or deserialize a cached value.
    #[error("cache serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache operations used by the address service.
pub trait CacheService: Send + Sync + 'static {
    /// Get a value by key. `Ok(None)` is a miss.
    fn get(&self, key: &str) -> impl Future<Output = CacheResult<Option<String>>> + Send;

    /// Store a value. `ttl` of `None` keeps the entry until evicted.
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = CacheResult<()>> + Send;

    /// Remove a key. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = CacheResult<()>> + Send;

    /// Check that the backend is usable.
    fn health_check(&self) -> impl Future<Output = CacheResult<bool>> + Send;

    /// Name of the backing provider, for logs.
    fn provider_name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: String,
    ttl: Option<Duration>,
}

/// Expires each entry after the TTL it was written with.
struct EntryExpiry;

impl moka::Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// In-memory cache service backed by `moka`.
///
/// Not shared between processes; each instance warms its own entries from
/// the store.
#[derive(Clone)]
pub struct MokaCacheService {
    cache: moka::future::Cache<String, CacheEntry>,
}

impl std::fmt::Debug for MokaCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCacheService")
            .field("max_capacity", &self.cache.policy().max_capacity())
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl MokaCacheService {
    /// Create a cache holding at most `max_capacity` entries.
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        let cache = moka::future::Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryExpiry)
            .build();

        debug!(max_capacity, "Moka cache service created");

        Self { cache }
    }
}

impl CacheService for MokaCacheService {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let entry = self.cache.get(key).await;
        debug!(key, hit = entry.is_some(), "Cache GET (moka)");
        Ok(entry.map(|entry| entry.payload))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        self.cache
            .insert(
                key.to_owned(),
                CacheEntry {
                    payload: value.to_owned(),
                    ttl,
                },
            )
            .await;
        debug!(key, ttl_seconds = ttl.map(|t| t.as_secs()), "Cache SET (moka)");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.cache.invalidate(key).await;
        debug!(key, "Cache DEL (moka)");
        Ok(())
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "moka"
    }
}
