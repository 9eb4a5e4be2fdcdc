//! Address service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ADDRESS_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `ENCRYPTION_SERVICE_HOST` - Base URL of the encryption gateway
//!
//! ## Optional
//! - `ADDRESS_HOST` - Bind address (default: 127.0.0.1)
//! - `ADDRESS_PORT` - Listen port (default: 3000)
//! - `ENCRYPTION_SERVICE_REQ_TIMEOUT_MS` - Gateway request timeout (default: 1000)
//! - `ADDRESS_CACHE_TTL_SECS` - TTL of cached address lists (default: 3600)
//! - `ADDRESS_CACHE_MAX_CAPACITY` - Maximum cached lists (default: 100000)
//! - `ADDRESS_CACHE_REFRESH_TIMEOUT_MS` - Background cache refresh bound (default: 2000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Address service configuration.
#[derive(Debug, Clone)]
pub struct AddressServiceConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    pub encryption: EncryptionConfig,
    pub cache: CacheConfig,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Encryption gateway connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionConfig {
    /// Base URL, e.g. `http://encryption.internal:8080`
    pub host: String,
    pub request_timeout: Duration,
}

/// Address list cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_capacity: u64,
    /// Upper bound on a background refresh after create or update.
    pub refresh_timeout: Duration,
}

impl AddressServiceConfig {
    /// Load configuration from the environment (and `.env` if present).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup` instead of the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(lookup);

        Ok(Self {
            database_url: env.database_url("ADDRESS_DATABASE_URL")?,
            host: env.parsed_or("ADDRESS_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: env.parsed_or("ADDRESS_PORT", 3000)?,
            encryption: EncryptionConfig {
                host: env.required("ENCRYPTION_SERVICE_HOST")?,
                request_timeout: Duration::from_millis(
                    env.parsed_or("ENCRYPTION_SERVICE_REQ_TIMEOUT_MS", 1000)?,
                ),
            },
            cache: CacheConfig {
                ttl: Duration::from_secs(env.parsed_or("ADDRESS_CACHE_TTL_SECS", 3600)?),
                max_capacity: env.parsed_or("ADDRESS_CACHE_MAX_CAPACITY", 100_000)?,
                refresh_timeout: Duration::from_millis(
                    env.parsed_or("ADDRESS_CACHE_REFRESH_TIMEOUT_MS", 2000)?,
                ),
            },
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn database_url(&self, primary_key: &str) -> Result<SecretString, ConfigError> {
        // Fallback to generic DATABASE_URL
        self.optional(primary_key)
            .or_else(|| self.optional("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
    }

    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        }
    }
}
