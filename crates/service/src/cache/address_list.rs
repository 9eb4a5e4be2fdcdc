//! Cached representation of a user's ordered address list.

use std::collections::HashMap;

use address_book_core::{Address, AddressId, OrderedAddresses, UserId};
use serde::{Deserialize, Serialize};

use super::{CacheError, CacheResult};

/// Cache key holding the address list of `user`.
#[must_use]
pub fn address_list_key(user: UserId) -> String {
    format!("address_list_key_{user}")
}

/// Address snapshots keyed by id plus the positional order.
///
/// `order` is the output of the ordering engine: it lists the default
/// billing address first, the default shipping address second (the same id
/// twice when `collapsed`), and the rest after that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAddressList {
    addresses: HashMap<AddressId, Address>,
    order: Vec<AddressId>,
    collapsed: bool,
}

impl CachedAddressList {
    /// Build the cached form of an ordered list.
    #[must_use]
    pub fn from_ordered(addresses: Vec<Address>, collapsed: bool) -> Self {
        let order = addresses.iter().map(|address| address.id).collect();
        let addresses = addresses
            .into_iter()
            .map(|address| (address.id, address))
            .collect();
        Self {
            addresses,
            order,
            collapsed,
        }
    }

    /// Expand back into the positional list.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::SerializationError` if `order` references an id
    /// that has no snapshot, which means the entry is corrupt.
    pub fn ordered(&self) -> CacheResult<Vec<Address>> {
        self.order
            .iter()
            .map(|id| {
                self.addresses.get(id).cloned().ok_or_else(|| {
                    CacheError::SerializationError(format!(
                        "order references unknown address {id}"
                    ))
                })
            })
            .collect()
    }

    #[must_use]
    pub const fn collapsed(&self) -> bool {
        self.collapsed
    }

    /// Serialize for storage under [`address_list_key`].
    ///
    /// # Errors
    ///
    /// Returns `CacheError::SerializationError` if encoding fails.
    pub fn encode(&self) -> CacheResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a stored payload and expand it into the positional list.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::SerializationError` for undecodable or corrupt
    /// payloads.
    pub fn decode(payload: &str) -> CacheResult<Vec<Address>> {
        let cached: Self = serde_json::from_str(payload)?;
        cached.ordered()
    }
}

impl From<&OrderedAddresses> for CachedAddressList {
    fn from(ordered: &OrderedAddresses) -> Self {
        Self::from_ordered(ordered.addresses.clone(), ordered.collapsed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use address_book_core::{AddressKind, CountryId, RegionId, ValidationFlag, order};
    use chrono::Utc;

    use super::*;

    fn address(id: i32, billing: bool, shipping: bool) -> Address {
        let now = Utc::now();
        Address {
            id: AddressId::new(id),
            user_id: UserId::new(5),
            first_name: "Asha".to_owned(),
            last_name: "Rao".to_owned(),
            address1: "4 Lake View Road".to_owned(),
            address2: String::new(),
            city: "Kochi".to_owned(),
            region_id: RegionId::new(3),
            region_name: "Kerala".to_owned(),
            postcode: "682001".to_owned(),
            country_id: CountryId::new(1),
            phone: "+919876543210".to_owned(),
            alternate_phone: String::new(),
            is_default_billing: billing,
            is_default_shipping: shipping,
            address_type: AddressKind::Home,
            sms_opt: true,
            validation_flag: ValidationFlag::Clean,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_key_format() {
        assert_eq!(address_list_key(UserId::new(42)), "address_list_key_42");
    }

    #[test]
    fn test_collapsed_list_survives_encoding() {
        let ordered = order(vec![address(1, true, true), address(2, false, false)]);
        let cached = CachedAddressList::from(&ordered);
        assert!(cached.collapsed());

        let payload = cached.encode().unwrap();
        let decoded = CachedAddressList::decode(&payload).unwrap();
        let ids: Vec<i32> = decoded.iter().map(|a| a.id.as_i32()).collect();
        assert_eq!(ids, vec![1, 1, 2]);
        assert_eq!(decoded, ordered.addresses);
    }

    #[test]
    fn test_dangling_order_is_corrupt() {
        let payload = r#"{"addresses":{},"order":[9],"collapsed":false}"#;
        let err = CachedAddressList::decode(payload).unwrap_err();
        assert!(matches!(err, CacheError::SerializationError(_)));
    }

    #[test]
    fn test_garbage_payload_is_corrupt() {
        let err = CachedAddressList::decode("not json").unwrap_err();
        assert!(matches!(err, CacheError::SerializationError(_)));
    }
}
