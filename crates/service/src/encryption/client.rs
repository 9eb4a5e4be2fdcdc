//! HTTP client for the encryption gateway.

use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{CipherOp, EncryptionError, EncryptionGateway};
use crate::config::EncryptionConfig;

const ENCRYPT_PATH: &str = "/encryption/v1/encrypt/";
const DECRYPT_PATH: &str = "/encryption/v1/decrypt/";

/// Gateway response body: `{"Data": [...]}`.
#[derive(Debug, Deserialize)]
struct GatewayResponse {
    #[serde(rename = "Data")]
    data: Vec<Option<String>>,
}

/// Client for the encryption gateway.
///
/// Values are sent as repeated `q` query parameters on a `GET` request.
#[derive(Debug, Clone)]
pub struct HttpEncryptionGateway {
    client: reqwest::Client,
    encrypt_url: Url,
    decrypt_url: Url,
}

impl HttpEncryptionGateway {
    /// Create a client for the gateway at `config.host`.
    ///
    /// # Errors
    ///
    /// Returns `EncryptionError::InvalidUrl` if the host is not a base URL,
    /// or `EncryptionError::Http` if the HTTP client cannot be built.
    pub fn new(config: &EncryptionConfig) -> Result<Self, EncryptionError> {
        let base = Url::parse(&config.host)?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            encrypt_url: base.join(ENCRYPT_PATH)?,
            decrypt_url: base.join(DECRYPT_PATH)?,
        })
    }

    fn request_url(&self, op: CipherOp, values: &[String]) -> Url {
        let mut url = match op {
            CipherOp::Encrypt => self.encrypt_url.clone(),
            CipherOp::Decrypt => self.decrypt_url.clone(),
        };
        {
            let mut query = url.query_pairs_mut();
            for value in values {
                query.append_pair("q", value);
            }
        }
        url
    }

    #[instrument(skip(self, values), fields(op = op.as_str(), count = values.len()))]
    async fn call(&self, op: CipherOp, values: &[String]) -> Result<Vec<String>, EncryptionError> {
        let response = self
            .client
            .get(self.request_url(op, values))
            .send()
            .await
            .map_err(timeout_or_http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(EncryptionError::Status(status.as_u16()));
        }

        let body: GatewayResponse = response.json().await.map_err(|e| {
            if e.is_decode() {
                EncryptionError::Malformed(e.to_string())
            } else {
                timeout_or_http(e)
            }
        })?;

        if body.data.len() != values.len() {
            return Err(EncryptionError::Malformed(format!(
                "expected {} values, got {}",
                values.len(),
                body.data.len()
            )));
        }

        debug!("Encryption gateway call succeeded");
        Ok(body.data.into_iter().map(Option::unwrap_or_default).collect())
    }
}

fn timeout_or_http(err: reqwest::Error) -> EncryptionError {
    if err.is_timeout() {
        EncryptionError::Timeout
    } else {
        EncryptionError::Http(err)
    }
}

impl EncryptionGateway for HttpEncryptionGateway {
    async fn encrypt(&self, values: &[String]) -> Result<Vec<String>, EncryptionError> {
        self.call(CipherOp::Encrypt, values).await
    }

    async fn decrypt(&self, values: &[String]) -> Result<Vec<String>, EncryptionError> {
        self.call(CipherOp::Decrypt, values).await
    }
}
