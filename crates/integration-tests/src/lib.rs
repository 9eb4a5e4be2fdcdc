//! In-memory implementations of the address service's store, cache and
//! gateway, for scenario tests that need no database or network.
//!
//! Every fake is `Clone` and clones share state, so a test can hand one
//! clone to the service and keep another to inspect or break it.

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use address_book_core::{AddressId, CountryId, DefaultFlags, DefaultRole, RegionId, UserId};
use address_book_service::cache::{CacheError, CacheResult, CacheService, MokaCacheService};
use address_book_service::db::{AddressRow, AddressStore, Region, RepositoryError, StoredAddress};
use address_book_service::encryption::{EncryptionError, EncryptionGateway};
use address_book_service::services::{AddressListService, AddressRequest, ServiceSettings};
use address_book_service::state::AppState;
use chrono::Utc;

// ============================================================================
// Store
// ============================================================================

#[derive(Default)]
struct StoreState {
    regions: HashMap<RegionId, Region>,
    rows: BTreeMap<AddressId, StoredAddress>,
    sms_opt: HashMap<UserId, bool>,
    next_id: i32,
}

impl StoreState {
    fn joined(&self, row: &StoredAddress) -> StoredAddress {
        let mut row = row.clone();
        row.region_name = self
            .regions
            .get(&row.region_id)
            .map(|region| region.name.clone())
            .unwrap_or_default();
        row.sms_opt = self.sms_opt.get(&row.user_id).copied().unwrap_or(false);
        row
    }

    fn owned(&self, user: UserId, id: AddressId) -> Option<&StoredAddress> {
        self.rows.get(&id).filter(|row| row.user_id == user)
    }
}

/// Address store backed by a `BTreeMap`.
#[derive(Clone, Default)]
pub struct InMemoryAddressStore {
    state: Arc<Mutex<StoreState>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryAddressStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a region.
    pub fn add_region(&self, id: i32, name: &str, country: i32) {
        let region = Region {
            id: RegionId::new(id),
            name: name.to_string(),
            country_id: CountryId::new(country),
        };
        self.state.lock().unwrap().regions.insert(region.id, region);
    }

    /// Make every write fail with a database error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw rows of `user`, as the database would hold them.
    #[must_use]
    pub fn rows(&self, user: UserId) -> Vec<StoredAddress> {
        let state = self.state.lock().unwrap();
        state
            .rows
            .values()
            .filter(|row| row.user_id == user)
            .map(|row| state.joined(row))
            .collect()
    }

    /// Overwrite the flags of a row directly, bypassing the invariant.
    pub fn force_flags(&self, id: AddressId, billing: bool, shipping: bool) {
        let mut state = self.state.lock().unwrap();
        if let Some(row) = state.rows.get_mut(&id) {
            row.is_default_billing = billing;
            row.is_default_shipping = shipping;
        }
    }

    fn check_writable(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

impl AddressStore for InMemoryAddressStore {
    async fn find_region(&self, region: RegionId) -> Result<Option<Region>, RepositoryError> {
        Ok(self.state.lock().unwrap().regions.get(&region).cloned())
    }

    async fn count_addresses(&self, user: UserId) -> Result<i64, RepositoryError> {
        let state = self.state.lock().unwrap();
        let count = state.rows.values().filter(|row| row.user_id == user).count();
        Ok(i64::try_from(count).unwrap())
    }

    async fn list_addresses(&self, user: UserId) -> Result<Vec<StoredAddress>, RepositoryError> {
        Ok(self.rows(user))
    }

    async fn find_address(
        &self,
        user: UserId,
        id: AddressId,
    ) -> Result<Option<StoredAddress>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state.owned(user, id).map(|row| state.joined(row)))
    }

    async fn default_flags(
        &self,
        user: UserId,
        id: AddressId,
    ) -> Result<Option<DefaultFlags>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state.owned(user, id).map(|row| DefaultFlags {
            billing: row.is_default_billing,
            shipping: row.is_default_shipping,
        }))
    }

    async fn insert_address(
        &self,
        user: UserId,
        row: &AddressRow,
        make_default: bool,
    ) -> Result<AddressId, RepositoryError> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        if !state.regions.contains_key(&row.region_id) {
            return Err(RepositoryError::Conflict("unknown region".to_string()));
        }

        state.next_id += 1;
        let id = AddressId::new(state.next_id);
        let now = Utc::now();
        state.rows.insert(
            id,
            StoredAddress {
                id,
                user_id: user,
                first_name: row.first_name.clone(),
                last_name: row.last_name.clone().unwrap_or_default(),
                phone: row.phone.clone(),
                alternate_phone: row.alternate_phone.clone(),
                address1: row.address1.clone(),
                address2: row.address2.clone().unwrap_or_default(),
                city: row.city.clone(),
                region_id: row.region_id,
                region_name: String::new(),
                postcode: row.postcode.clone(),
                country_id: row.country_id,
                is_default_billing: make_default,
                is_default_shipping: make_default,
                address_type: row.address_type.unwrap_or_default().as_str().to_string(),
                sms_opt: false,
                validation_flag: row.validation_flag.as_code().to_string(),
                created_at: now,
                updated_at: now,
            },
        );
        if let Some(sms_opt) = row.sms_opt {
            state.sms_opt.insert(user, sms_opt);
        }
        Ok(id)
    }

    async fn update_address(
        &self,
        user: UserId,
        id: AddressId,
        row: &AddressRow,
    ) -> Result<u64, RepositoryError> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        let Some(stored) = state.rows.get_mut(&id).filter(|r| r.user_id == user) else {
            return Ok(0);
        };

        stored.first_name.clone_from(&row.first_name);
        if let Some(last_name) = &row.last_name {
            stored.last_name.clone_from(last_name);
        }
        if row.phone.is_some() {
            stored.phone.clone_from(&row.phone);
        }
        if row.alternate_phone.is_some() {
            stored.alternate_phone.clone_from(&row.alternate_phone);
        }
        stored.address1.clone_from(&row.address1);
        if let Some(address2) = &row.address2 {
            stored.address2.clone_from(address2);
        }
        stored.city.clone_from(&row.city);
        stored.region_id = row.region_id;
        stored.postcode.clone_from(&row.postcode);
        stored.country_id = row.country_id;
        if let Some(kind) = row.address_type {
            stored.address_type = kind.as_str().to_string();
        }
        stored.validation_flag = row.validation_flag.as_code().to_string();
        stored.updated_at = Utc::now();

        if let Some(sms_opt) = row.sms_opt {
            state.sms_opt.insert(user, sms_opt);
        }
        Ok(1)
    }

    async fn delete_address(&self, user: UserId, id: AddressId) -> Result<u64, RepositoryError> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        if state.owned(user, id).is_none() {
            return Ok(0);
        }
        state.rows.remove(&id);
        Ok(1)
    }

    async fn set_default(
        &self,
        user: UserId,
        id: AddressId,
        role: DefaultRole,
    ) -> Result<u64, RepositoryError> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        if state.owned(user, id).is_none() {
            return Ok(0);
        }
        for row in state.rows.values_mut().filter(|row| row.user_id == user) {
            match role {
                DefaultRole::Billing => row.is_default_billing = row.id == id,
                DefaultRole::Shipping => row.is_default_shipping = row.id == id,
            }
        }
        Ok(1)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

// ============================================================================
// Cache
// ============================================================================

/// The production moka cache with switchable failures.
#[derive(Clone)]
pub struct FakeCache {
    inner: MokaCacheService,
    failing: Arc<AtomicBool>,
}

impl Default for FakeCache {
    fn default() -> Self {
        Self {
            inner: MokaCacheService::new(1_000),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl FakeCache {
    /// Make every cache call fail.
    pub fn fail(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }

    /// Read a key, bypassing the failure switch.
    pub async fn raw(&self, key: &str) -> Option<String> {
        self.inner.get(key).await.unwrap()
    }

    /// Write a key, bypassing the failure switch.
    pub async fn put_raw(&self, key: &str, value: &str) {
        self.inner.set(key, value, None).await.unwrap();
    }

    fn check(&self) -> CacheResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::ConnectionError("cache is down".to_string()));
        }
        Ok(())
    }
}

impl CacheService for FakeCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn health_check(&self) -> CacheResult<bool> {
        self.check()?;
        self.inner.health_check().await
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

// ============================================================================
// Encryption gateway
// ============================================================================

/// Reversible stand-in for the encryption gateway: ciphertext is the
/// plaintext with an `enc:` prefix.
#[derive(Clone, Default)]
pub struct FakeGateway {
    fail_encrypt: Arc<AtomicBool>,
    fail_decrypt: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

pub const CIPHER_PREFIX: &str = "enc:";

impl FakeGateway {
    pub fn fail_encrypt(&self, fail: bool) {
        self.fail_encrypt.store(fail, Ordering::SeqCst);
    }

    pub fn fail_decrypt(&self, fail: bool) {
        self.fail_decrypt.store(fail, Ordering::SeqCst);
    }

    /// Number of gateway round trips so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EncryptionGateway for FakeGateway {
    async fn encrypt(&self, values: &[String]) -> Result<Vec<String>, EncryptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_encrypt.load(Ordering::SeqCst) {
            return Err(EncryptionError::Timeout);
        }
        Ok(values.iter().map(|v| format!("{CIPHER_PREFIX}{v}")).collect())
    }

    async fn decrypt(&self, values: &[String]) -> Result<Vec<String>, EncryptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_decrypt.load(Ordering::SeqCst) {
            return Err(EncryptionError::Status(503));
        }
        values
            .iter()
            .map(|v| {
                v.strip_prefix(CIPHER_PREFIX)
                    .map(str::to_string)
                    .ok_or_else(|| EncryptionError::Malformed(format!("not a ciphertext: {v}")))
            })
            .collect()
    }
}

// ============================================================================
// Harness
// ============================================================================

pub type TestService = AddressListService<InMemoryAddressStore, FakeCache, FakeGateway>;

/// A service wired to fresh fakes, with two regions in country 1.
pub struct Harness {
    pub store: InMemoryAddressStore,
    pub cache: FakeCache,
    pub gateway: FakeGateway,
    pub service: TestService,
}

pub const MAHARASHTRA: i32 = 1;
pub const KARNATAKA: i32 = 2;

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        let store = InMemoryAddressStore::new();
        store.add_region(MAHARASHTRA, "Maharashtra", 1);
        store.add_region(KARNATAKA, "Karnataka", 1);
        let cache = FakeCache::default();
        let gateway = FakeGateway::default();

        let service = AddressListService::new(
            store.clone(),
            cache.clone(),
            gateway.clone(),
            ServiceSettings {
                cache_ttl: Some(Duration::from_secs(60)),
                refresh_timeout: Duration::from_secs(1),
            },
        );

        Self {
            store,
            cache,
            gateway,
            service,
        }
    }

    #[must_use]
    pub fn state(&self) -> AppState<InMemoryAddressStore, FakeCache, FakeGateway> {
        AppState::new(self.service.clone())
    }
}

/// A valid request for an address in Pune.
#[must_use]
pub fn address_request(first_name: &str) -> AddressRequest {
    AddressRequest {
        first_name: Some(first_name.to_string()),
        last_name: Some("Kulkarni".to_string()),
        phone: Some("+919812345678".to_string()),
        address1: Some("12 FC Road".to_string()),
        address2: Some("Shivajinagar".to_string()),
        city: Some("Pune".to_string()),
        address_region: Some(MAHARASHTRA.to_string()),
        postcode: Some("411005".to_string()),
        is_office: Some("0".to_string()),
        ..AddressRequest::default()
    }
}

/// Let background cache tasks finish.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Shorthand for a user id.
#[must_use]
pub const fn user(id: i32) -> UserId {
    UserId::new(id)
}

