//! Business logic for the address book.
//!
//! - [`address_list`] - list, create, update, delete and set-default over the
//!   store, cache and encryption gateway
//! - [`validator`] - request schema, field rules and query parsing
//! - [`error`] - the operation error taxonomy

pub mod address_list;
pub mod error;
pub mod validator;

pub use address_list::{AddressListService, AddressPage, ListSummary, ServiceSettings};
pub use error::{AddressError, FieldError};
pub use validator::{AddressRequest, Page, ValidatedAddress};
