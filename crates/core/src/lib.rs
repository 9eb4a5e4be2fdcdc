//! Address Book Core - Shared types and pure logic.
//!
//! This crate provides the domain types and the side-effect free parts of the
//! address book used by the service and the CLI:
//!
//! - [`types`] - Newtype IDs, the [`Address`] snapshot, and role/filter enums
//! - [`ordering`] - Positional ordering of a user's cached address list
//! - [`quality`] - Text-quality heuristic used to tag stored addresses
//! - [`sanitize`] - Transliteration and character whitelisting for free text
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Everything here is deterministic and can be tested
//! without a runtime.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod ordering;
pub mod quality;
pub mod sanitize;
pub mod types;

pub use ordering::{OrderOutcome, OrderedAddresses, normalize, order};
pub use quality::score;
pub use types::*;
