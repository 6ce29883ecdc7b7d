//! Error types for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: failures of upstream fetches and data access
//! - [`CacheError`]: failures of the cache snapshot file

use thiserror::Error;

/// Errors that can occur while fetching market data from an upstream source.
///
/// The data access layer never surfaces these to the transport layer: every
/// variant is retried (for flaky sources) and then converted into a degraded
/// result for its category.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The requested symbol was not found by the provider.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// No data available for the requested range.
    #[error("No data for range")]
    NoDataForRange,

    /// The provider rate limited the request (HTTP 429).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the provider did not complete within the upstream timeout.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// A provider-specific error occurred.
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The provider returned data that failed sanity checks.
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Description of the validation failure
        message: String,
    },

    /// A cache key could not be built from the request identifier.
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A payload could not be converted to or from its cached form.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MarketDataError {
    /// Shorthand for a [`MarketDataError::ProviderError`].
    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Shorthand for a [`MarketDataError::ValidationFailed`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }
}

/// Errors raised while reading or writing the cache snapshot file.
///
/// These never propagate past the cache store's public lifecycle methods
/// except through [`CacheStore::persist`](crate::cache::CacheStore::persist),
/// which returns them so callers can decide whether to log or ignore.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache snapshot could not be encoded or decoded: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported cache snapshot version: {0}")]
    UnsupportedVersion(u32),
}

impl From<tempfile::PersistError> for CacheError {
    fn from(err: tempfile::PersistError) -> Self {
        Self::Io(err.error)
    }
}
