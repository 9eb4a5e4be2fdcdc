//! Classifier enums for addresses: default roles, list filters, address kind
//! and the stored text-quality flag.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when an address type string is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid address type '{0}': expected one of all, billing, shipping, other")]
pub struct UnknownAddressType(pub String);

/// A default role an address can hold for its owner.
///
/// Each user has at most one address per role; one address may hold both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultRole {
    Billing,
    Shipping,
}

impl DefaultRole {
    /// Name of the flag column backing this role.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Billing => "is_default_billing",
            Self::Shipping => "is_default_shipping",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Billing => "billing",
            Self::Shipping => "shipping",
        }
    }
}

impl fmt::Display for DefaultRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DefaultRole {
    type Err = UnknownAddressType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "billing" => Ok(Self::Billing),
            "shipping" => Ok(Self::Shipping),
            _ => Err(UnknownAddressType(s.to_owned())),
        }
    }
}

/// Which slice of a user's ordered address list a listing request wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AddressFilter {
    #[default]
    All,
    Billing,
    Shipping,
    Other,
}

impl AddressFilter {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Billing => "billing",
            Self::Shipping => "shipping",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for AddressFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressFilter {
    type Err = UnknownAddressType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "billing" => Ok(Self::Billing),
            "shipping" => Ok(Self::Shipping),
            "other" => Ok(Self::Other),
            _ => Err(UnknownAddressType(s.to_owned())),
        }
    }
}

/// Home/office classifier stored in `customer_address.address_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    #[default]
    Home,
    Office,
}

impl AddressKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Office => "office",
        }
    }

    /// Parse the stored column value. Unknown values fall back to `Home`.
    #[must_use]
    pub fn from_column(value: &str) -> Self {
        match value {
            "office" | "1" => Self::Office,
            _ => Self::Home,
        }
    }
}

/// Outcome of the text-quality heuristic, persisted as `validation_flag`.
///
/// The flag is only a hint for downstream review; it never blocks a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValidationFlag {
    #[default]
    Clean,
    Suspect,
}

impl ValidationFlag {
    /// Stored column value: `"1"` for clean text, `"0"` for suspect text.
    #[must_use]
    pub const fn as_code(self) -> &'static str {
        match self {
            Self::Clean => "1",
            Self::Suspect => "0",
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::Clean),
            "0" => Some(Self::Suspect),
            _ => None,
        }
    }
}
