//! Field-level encryption of PII through the external encryption gateway.
//!
//! Phone numbers are stored encrypted; the service never holds the keys.
//! Values go to the gateway in batches and come back in input order.
//!
//! - [`EncryptionGateway`] - one round trip for one batch
//! - [`HttpEncryptionGateway`] - production client (`GET` + JSON)
//! - [`BatchCipher`] - splits long inputs into fixed-size batches

mod batch;
mod client;

use std::future::Future;

use thiserror::Error;

pub use batch::{BATCH_SIZE, BatchCipher, BatchOutput};
pub use client::HttpEncryptionGateway;

/// Errors that can occur when talking to the encryption gateway.
#[derive(Debug, Error)]
pub enum EncryptionError {
    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway did not answer within the configured timeout.
    #[error("encryption gateway timed out")]
    Timeout,

    /// Non-success HTTP status.
    #[error("encryption gateway returned status {0}")]
    Status(u16),

    /// Response body did not match the expected shape.
    #[error("malformed gateway response: {0}")]
    Malformed(String),

    /// The configured gateway host is not a valid base URL.
    #[error("invalid gateway URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Direction of a gateway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherOp {
    Encrypt,
    Decrypt,
}

impl CipherOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
        }
    }
}

/// One round trip to the encryption gateway.
///
/// Implementations must return exactly one output per input, in order.
pub trait EncryptionGateway: Send + Sync + 'static {
    fn encrypt(
        &self,
        values: &[String],
    ) -> impl Future<Output = Result<Vec<String>, EncryptionError>> + Send;

    fn decrypt(
        &self,
        values: &[String],
    ) -> impl Future<Output = Result<Vec<String>, EncryptionError>> + Send;
}
