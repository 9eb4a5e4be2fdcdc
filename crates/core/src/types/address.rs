//! Address snapshot as cached and returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{AddressId, CountryId, RegionId, UserId};
use super::kind::{AddressKind, DefaultRole, ValidationFlag};

/// A user's address with PII fields in plaintext.
///
/// Phone numbers are encrypted at rest; this type only ever holds the
/// decrypted values and is what the cache and API responses carry. Field
/// names on the wire follow the `customer_address` columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "id_customer_address")]
    pub id: AddressId,
    #[serde(rename = "fk_customer")]
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    #[serde(rename = "fk_customer_address_region")]
    pub region_id: RegionId,
    pub region_name: String,
    pub postcode: String,
    #[serde(rename = "fk_country")]
    pub country_id: CountryId,
    pub phone: String,
    pub alternate_phone: String,
    pub is_default_billing: bool,
    pub is_default_shipping: bool,
    pub address_type: AddressKind,
    pub sms_opt: bool,
    pub validation_flag: ValidationFlag,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Address {
    /// Whether this address currently holds `role`.
    #[must_use]
    pub const fn holds(&self, role: DefaultRole) -> bool {
        match role {
            DefaultRole::Billing => self.is_default_billing,
            DefaultRole::Shipping => self.is_default_shipping,
        }
    }

    /// Set or clear the flag for `role`.
    pub const fn set_role(&mut self, role: DefaultRole, value: bool) {
        match role {
            DefaultRole::Billing => self.is_default_billing = value,
            DefaultRole::Shipping => self.is_default_shipping = value,
        }
    }

    #[must_use]
    pub const fn flags(&self) -> DefaultFlags {
        DefaultFlags {
            billing: self.is_default_billing,
            shipping: self.is_default_shipping,
        }
    }
}

/// The pair of default-role flags of a single address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DefaultFlags {
    pub billing: bool,
    pub shipping: bool,
}

impl DefaultFlags {
    #[must_use]
    pub const fn holds(self, role: DefaultRole) -> bool {
        match role {
            DefaultRole::Billing => self.billing,
            DefaultRole::Shipping => self.shipping,
        }
    }
}
