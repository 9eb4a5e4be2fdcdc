//! Address book operations over the store, the cache and the encryption
//! gateway.
//!
//! The store is authoritative. The cache holds each user's ordered address
//! list (see [`address_book_core::ordering`]) and is rebuilt from the store
//! whenever it is missing, corrupt or invalidated. Writes go to the store
//! first; the cached list is then patched and re-ordered, either in the
//! background (create, update) or before the caller gets an answer (delete,
//! set-default). Any store failure on a write path drops the user's cache
//! entry.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use address_book_core::{
    Address, AddressFilter, AddressId, DefaultRole, OrderOutcome, OrderedAddresses, UserId,
    normalize, order, score,
};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{Instrument, debug, info, instrument, warn};

use super::error::AddressError;
use super::validator::{AddressRequest, Page, ValidatedAddress};
use crate::cache::{CacheService, CachedAddressList, address_list_key};
use crate::config::CacheConfig;
use crate::db::{AddressRow, AddressStore, Region, RepositoryError, StoredAddress};
use crate::encryption::{BatchCipher, EncryptionGateway};

/// Counters returned alongside a page of addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ListSummary {
    pub count: usize,
    #[serde(rename = "type")]
    pub filter: AddressFilter,
}

/// Response body of list and delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressPage {
    pub summary: ListSummary,
    pub address_list: Vec<Address>,
}

impl AddressPage {
    fn new(filter: AddressFilter, addresses: Vec<Address>) -> Self {
        Self {
            summary: ListSummary {
                count: addresses.len(),
                filter,
            },
            address_list: addresses,
        }
    }
}

/// Cache behaviour of [`AddressListService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    /// TTL of cached address lists.
    pub cache_ttl: Option<Duration>,
    /// Upper bound on a background cache refresh.
    pub refresh_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Some(Duration::from_secs(3600)),
            refresh_timeout: Duration::from_secs(2),
        }
    }
}

impl From<&CacheConfig> for ServiceSettings {
    fn from(config: &CacheConfig) -> Self {
        Self {
            cache_ttl: Some(config.ttl),
            refresh_timeout: config.refresh_timeout,
        }
    }
}

struct Inner<S, C, E> {
    store: S,
    cache: C,
    cipher: BatchCipher<E>,
    settings: ServiceSettings,
}

/// Address book operations for a single user at a time.
///
/// Cheap to clone; clones share the same store, cache and gateway.
pub struct AddressListService<S, C, E> {
    inner: Arc<Inner<S, C, E>>,
}

impl<S, C, E> Clone for AddressListService<S, C, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Addresses read from the store, with whether every phone decrypted.
struct Decrypted {
    addresses: Vec<Address>,
    complete: bool,
}

impl<S, C, E> AddressListService<S, C, E>
where
    S: AddressStore,
    C: CacheService,
    E: EncryptionGateway,
{
    pub fn new(store: S, cache: C, gateway: E, settings: ServiceSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                cache,
                cipher: BatchCipher::new(gateway),
                settings,
            }),
        }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn cache(&self) -> &C {
        &self.inner.cache
    }

    /// One page of the user's addresses.
    ///
    /// `billing` and `shipping` return the role holder, if any; `other`
    /// returns every address holding neither slot; `all` returns each
    /// address once.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::Store` if the list has to be rebuilt and the
    /// store fails.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn list(
        &self,
        user: UserId,
        filter: AddressFilter,
        page: Page,
    ) -> Result<AddressPage, AddressError> {
        let ordered = self.ordered_list(user).await?;
        let selected: Vec<Address> = select(ordered, filter)
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect();
        Ok(AddressPage::new(filter, selected))
    }

    /// Create an address.
    ///
    /// The user's first address holds both default roles. For any later
    /// address, `default` promotes it to that role before returning.
    ///
    /// # Errors
    ///
    /// - `AddressError::Validation` for bad fields or an unknown region
    /// - `AddressError::Upstream` if phone numbers cannot be encrypted
    /// - `AddressError::Store` if the insert fails
    #[instrument(skip(self, request), fields(user_id = %user))]
    pub async fn create(
        &self,
        user: UserId,
        request: &AddressRequest,
        default: Option<DefaultRole>,
    ) -> Result<Address, AddressError> {
        let valid = request.validate()?;
        let region = self.region_for(&valid).await?;
        let first = self.is_first_address(user).await?;
        let row = self.address_row(&valid, &region).await?;

        let id = self
            .write(user, self.inner.store.insert_address(user, &row, first))
            .await?;
        info!(address_id = %id, first, "Address created");

        let (mut address, complete) = self.load_address(user, id).await?;

        if let Some(role) = default.filter(|_| !first) {
            self.set_default(user, id, role).await?;
            address.set_role(role, true);
        }

        // A snapshot with missing phone numbers must not reach the cache.
        if !complete {
            self.invalidate(user).await;
            return Ok(address);
        }

        let this = self.clone();
        let snapshot = address.clone();
        self.spawn_cache_task(user, "create", async move {
            this.patch_cache(user, move |list| Some(upsert(list, snapshot)))
                .await;
        });

        Ok(address)
    }

    /// Overwrite an address.
    ///
    /// Fields left empty in the request keep their stored value where the
    /// column allows it. `default` additionally promotes the address.
    ///
    /// # Errors
    ///
    /// - `AddressError::Validation` for bad fields or an unknown region
    /// - `AddressError::Upstream` if phone numbers cannot be encrypted
    /// - `AddressError::NotFound` if the user has no such address
    /// - `AddressError::Store` if the update fails
    #[instrument(skip(self, request), fields(user_id = %user, address_id = %id))]
    pub async fn update(
        &self,
        user: UserId,
        id: AddressId,
        request: &AddressRequest,
        default: Option<DefaultRole>,
    ) -> Result<(), AddressError> {
        let valid = request.validate()?;
        let region = self.region_for(&valid).await?;
        let row = self.address_row(&valid, &region).await?;

        let matched = self
            .write(user, self.inner.store.update_address(user, id, &row))
            .await?;
        if matched == 0 {
            return Err(AddressError::NotFound);
        }
        info!("Address updated");

        if let Some(role) = default {
            self.set_default(user, id, role).await?;
        }

        let this = self.clone();
        self.spawn_cache_task(user, "update", async move {
            this.refresh_address(user, id).await;
        });

        Ok(())
    }

    /// Delete an address that holds no default role and return what is
    /// left.
    ///
    /// # Errors
    ///
    /// - `AddressError::Conflict` if the address is a default
    /// - `AddressError::NotFound` if the user has no such address
    /// - `AddressError::Store` if the delete fails
    #[instrument(skip(self), fields(user_id = %user, address_id = %id))]
    pub async fn delete(&self, user: UserId, id: AddressId) -> Result<AddressPage, AddressError> {
        let cached = self
            .cached(user)
            .await
            .and_then(|list| list.into_iter().find(|address| address.id == id));
        let flags = match cached {
            Some(address) => address.flags(),
            None => self
                .inner
                .store
                .default_flags(user, id)
                .await?
                .ok_or(AddressError::NotFound)?,
        };

        if flags.billing {
            return Err(AddressError::Conflict(
                "Cannot delete default billing address".to_owned(),
            ));
        }
        if flags.shipping {
            return Err(AddressError::Conflict(
                "Select a different default delivery address first.".to_owned(),
            ));
        }

        let removed = self
            .write(user, self.inner.store.delete_address(user, id))
            .await?;
        if removed == 0 {
            return Err(AddressError::NotFound);
        }
        info!("Address deleted");

        self.patch_cache(user, move |list| {
            Some(list.into_iter().filter(|address| address.id != id).collect())
        })
        .await;

        let remaining = normalize(self.ordered_list(user).await?);
        Ok(AddressPage::new(AddressFilter::All, remaining))
    }

    /// Make `id` the user's default address for `role`.
    ///
    /// Runs to completion on a background task even if the caller goes
    /// away; the caller waits for its result.
    ///
    /// # Errors
    ///
    /// - `AddressError::NotFound` if the user has no such address
    /// - `AddressError::Store` if the store update fails
    #[instrument(skip(self), fields(user_id = %user, address_id = %id, role = %role))]
    pub async fn set_default(
        &self,
        user: UserId,
        id: AddressId,
        role: DefaultRole,
    ) -> Result<(), AddressError> {
        let (tx, rx) = oneshot::channel();
        let this = self.clone();

        tokio::spawn(
            async move {
                let result = this.apply_default(user, id, role).await;
                if tx.send(result).is_err() {
                    debug!("Caller stopped waiting for default promotion");
                }
            }
            .in_current_span(),
        );

        rx.await.map_err(|_| {
            AddressError::Internal("default promotion ended without a result".to_owned())
        })?
    }

    async fn apply_default(
        &self,
        user: UserId,
        id: AddressId,
        role: DefaultRole,
    ) -> Result<(), AddressError> {
        let flags = self
            .inner
            .store
            .default_flags(user, id)
            .await?
            .ok_or(AddressError::NotFound)?;
        if flags.holds(role) {
            debug!("Address already holds the role");
            return Ok(());
        }

        let promoted = self
            .write(user, self.inner.store.set_default(user, id, role))
            .await?;
        if promoted == 0 {
            return Err(AddressError::NotFound);
        }
        info!("Default address changed");

        self.patch_cache(user, move |list| promote(list, id, role))
            .await;
        Ok(())
    }

    /// Run a store write, dropping the user's cache entry if it fails.
    async fn write<T>(
        &self,
        user: UserId,
        op: impl Future<Output = Result<T, RepositoryError>> + Send,
    ) -> Result<T, AddressError> {
        match op.await {
            Ok(value) => Ok(value),
            Err(err) => {
                self.invalidate(user).await;
                Err(err.into())
            }
        }
    }

    async fn region_for(&self, valid: &ValidatedAddress) -> Result<Region, AddressError> {
        let region = self
            .inner
            .store
            .find_region(valid.region_id)
            .await?
            .ok_or_else(|| AddressError::invalid("address_region", "Unknown region"))?;

        if valid
            .country_id
            .is_some_and(|country| country != region.country_id)
        {
            return Err(AddressError::invalid(
                "country",
                "does not match address_region",
            ));
        }
        Ok(region)
    }

    async fn is_first_address(&self, user: UserId) -> Result<bool, AddressError> {
        if self.cached(user).await.is_some_and(|list| !list.is_empty()) {
            return Ok(false);
        }
        Ok(self.inner.store.count_addresses(user).await? == 0)
    }

    /// Score the address text and encrypt the phone numbers.
    async fn address_row(
        &self,
        valid: &ValidatedAddress,
        region: &Region,
    ) -> Result<AddressRow, AddressError> {
        let phones = [
            valid.phone.clone().unwrap_or_default(),
            valid.alt_phone.clone().unwrap_or_default(),
        ];
        let mut encrypted = self
            .inner
            .cipher
            .encrypt(&phones)
            .await
            .into_complete()?
            .into_iter()
            .map(|value| Some(value).filter(|v| !v.is_empty()));

        Ok(AddressRow {
            first_name: valid.first_name.clone(),
            last_name: valid.last_name.clone(),
            address1: valid.address1.clone(),
            address2: valid.address2.clone(),
            city: valid.city.clone(),
            region_id: region.id,
            country_id: region.country_id,
            postcode: valid.postcode.clone(),
            phone: encrypted.next().flatten(),
            alternate_phone: encrypted.next().flatten(),
            address_type: valid.address_type,
            sms_opt: valid.sms_opt,
            validation_flag: score(&valid.scored_text()),
        })
    }

    /// Read one address from the store and decrypt it.
    async fn load_address(
        &self,
        user: UserId,
        id: AddressId,
    ) -> Result<(Address, bool), AddressError> {
        let row = self
            .inner
            .store
            .find_address(user, id)
            .await?
            .ok_or(AddressError::NotFound)?;
        let Decrypted {
            addresses,
            complete,
        } = self.decrypt_rows(vec![row]).await?;
        let address = addresses.into_iter().next().ok_or(AddressError::NotFound)?;
        Ok((address, complete))
    }

    /// Decrypt phone columns of `rows` in as few gateway calls as possible.
    ///
    /// Failed batches leave empty phone numbers.
    async fn decrypt_rows(&self, rows: Vec<StoredAddress>) -> Result<Decrypted, AddressError> {
        let ciphertexts: Vec<String> = rows
            .iter()
            .flat_map(StoredAddress::encrypted_phones)
            .collect();
        let output = self.inner.cipher.decrypt(&ciphertexts).await;
        let complete = output.failed_batches() == 0;
        if !complete {
            warn!(
                failed_batches = output.failed_batches(),
                "Serving addresses without decrypted phone numbers"
            );
        }

        let mut plain = output.values.into_iter();
        let addresses = rows
            .into_iter()
            .map(|row| {
                let phone = plain.next().unwrap_or_default();
                let alternate_phone = plain.next().unwrap_or_default();
                row.into_address(phone, alternate_phone)
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(Decrypted {
            addresses,
            complete,
        })
    }

    /// The user's ordered list, from the cache or rebuilt from the store.
    async fn ordered_list(&self, user: UserId) -> Result<Vec<Address>, AddressError> {
        if let Some(list) = self.cached(user).await {
            debug!(user_id = %user, "Address list served from cache");
            return Ok(list);
        }
        self.rebuild(user).await
    }

    async fn rebuild(&self, user: UserId) -> Result<Vec<Address>, AddressError> {
        let rows = self.inner.store.list_addresses(user).await?;
        let Decrypted {
            addresses,
            complete,
        } = self.decrypt_rows(rows).await?;
        let ordered = order(addresses);

        // Lists with missing phone numbers are served but not cached.
        if complete {
            self.save(user, &ordered).await;
        } else {
            report_outcome(user, &ordered);
        }
        debug!(user_id = %user, count = ordered.addresses.len(), "Address list rebuilt");
        Ok(ordered.addresses)
    }

    /// Cached list of `user`. Unreadable entries count as a miss.
    async fn cached(&self, user: UserId) -> Option<Vec<Address>> {
        let key = address_list_key(user);
        match self.inner.cache.get(&key).await {
            Ok(Some(payload)) => match CachedAddressList::decode(&payload) {
                Ok(list) => Some(list),
                Err(err) => {
                    warn!(user_id = %user, error = %err, "Discarding unreadable cached address list");
                    self.invalidate(user).await;
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(
                    user_id = %user,
                    provider = self.inner.cache.provider_name(),
                    error = %err,
                    "Cache read failed"
                );
                None
            }
        }
    }

    /// Store an ordered list. Returns whether the write succeeded.
    async fn save(&self, user: UserId, ordered: &OrderedAddresses) -> bool {
        report_outcome(user, ordered);

        let payload = match CachedAddressList::from(ordered).encode() {
            Ok(payload) => payload,
            Err(err) => {
                warn!(user_id = %user, error = %err, "Failed to encode address list");
                return false;
            }
        };

        let key = address_list_key(user);
        match self
            .inner
            .cache
            .set(&key, &payload, self.inner.settings.cache_ttl)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!(user_id = %user, error = %err, "Cache write failed");
                false
            }
        }
    }

    async fn invalidate(&self, user: UserId) {
        if let Err(err) = self.inner.cache.delete(&address_list_key(user)).await {
            warn!(user_id = %user, error = %err, "Cache invalidation failed");
        }
    }

    /// Apply `patch` to the cached list, if there is one, and re-order it.
    ///
    /// A patch returning `None` or a failed write drops the entry instead.
    async fn patch_cache<F>(&self, user: UserId, patch: F)
    where
        F: FnOnce(Vec<Address>) -> Option<Vec<Address>> + Send,
    {
        let Some(current) = self.cached(user).await else {
            return;
        };

        let saved = match patch(normalize(current)) {
            Some(patched) => self.save(user, &order(patched)).await,
            None => false,
        };
        if !saved {
            self.invalidate(user).await;
        }
    }

    /// Re-read one address and replace it in the cached list.
    async fn refresh_address(&self, user: UserId, id: AddressId) {
        match self.load_address(user, id).await {
            Ok((address, true)) => {
                self.patch_cache(user, move |list| Some(upsert(list, address)))
                    .await;
            }
            Ok((_, false)) => self.invalidate(user).await,
            Err(err) => {
                warn!(user_id = %user, address_id = %id, error = %err, "Address refresh failed");
                self.invalidate(user).await;
            }
        }
    }

    /// Run `work` in the background under the refresh timeout.
    ///
    /// A refresh that times out drops the user's cache entry.
    fn spawn_cache_task<F>(&self, user: UserId, task: &'static str, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let this = self.clone();
        let timeout = self.inner.settings.refresh_timeout;

        tokio::spawn(
            async move {
                if tokio::time::timeout(timeout, work).await.is_err() {
                    warn!(user_id = %user, task, "Background cache refresh timed out");
                    this.invalidate(user).await;
                }
            }
            .in_current_span(),
        );
    }
}

fn report_outcome(user: UserId, ordered: &OrderedAddresses) {
    if ordered.outcome == OrderOutcome::Unresolved {
        warn!(
            user_id = %user,
            unresolved_defaults = true,
            "Address list has conflicting default flags"
        );
    }
}

/// Slice of an ordered list selected by `filter`.
fn select(ordered: Vec<Address>, filter: AddressFilter) -> Vec<Address> {
    match filter {
        AddressFilter::All => normalize(ordered),
        AddressFilter::Billing => ordered
            .into_iter()
            .next()
            .filter(|address| address.is_default_billing)
            .into_iter()
            .collect(),
        AddressFilter::Shipping => ordered
            .into_iter()
            .nth(1)
            .filter(|address| address.is_default_shipping)
            .into_iter()
            .collect(),
        AddressFilter::Other => ordered.into_iter().skip(2).collect(),
    }
}

/// Insert or replace `address` in a distinct list.
///
/// Roles held by `address` are cleared on every other entry and the
/// user-level SMS preference is copied to all of them.
fn upsert(mut list: Vec<Address>, address: Address) -> Vec<Address> {
    for role in [DefaultRole::Billing, DefaultRole::Shipping] {
        if address.holds(role) {
            for other in list.iter_mut().filter(|other| other.id != address.id) {
                other.set_role(role, false);
            }
        }
    }
    for other in &mut list {
        other.sms_opt = address.sms_opt;
    }

    match list.iter_mut().find(|other| other.id == address.id) {
        Some(slot) => *slot = address,
        None => list.push(address),
    }
    list
}

/// Move `role` to `id`. `None` if `id` is not in the list.
fn promote(mut list: Vec<Address>, id: AddressId, role: DefaultRole) -> Option<Vec<Address>> {
    if !list.iter().any(|address| address.id == id) {
        return None;
    }
    for address in &mut list {
        address.set_role(role, address.id == id);
    }
    Some(list)
}
