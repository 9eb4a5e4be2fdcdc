//! Core types for the address book.
//!
//! This module provides type-safe wrappers and value types for addresses.

pub mod address;
pub mod id;
pub mod kind;

pub use address::{Address, DefaultFlags};
pub use id::*;
pub use kind::{AddressFilter, AddressKind, DefaultRole, UnknownAddressType, ValidationFlag};
