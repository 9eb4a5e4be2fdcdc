//! Address Book Service library.
//!
//! This crate provides the address book HTTP service as a library, allowing
//! the router to be served against in-memory implementations in tests.
//!
//! - [`services`] - list, create, update, delete and set-default operations
//! - [`db`] - `PostgreSQL` address store
//! - [`cache`] - cached, position-ordered address lists
//! - [`encryption`] - batched PII encryption through the encryption gateway
//! - [`routes`] / [`middleware`] - axum surface

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod db;
pub mod encryption;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
