//! Error types for messaging operations.

use std::num::ParseIntError;
use thiserror::Error;

/// Error type for all messaging operations
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("There is no configuration with id '{queue_id}' in the configuration")]
    ConfigurationNotFound { queue_id: String },

    #[error("Message body of kind '{kind}' cannot be converted to wire properties")]
    UnsupportedMessageType { kind: String },

    #[error("Expiration '{value}' is not a valid millisecond duration")]
    InvalidExpiration {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("Timestamp {value} is outside the representable date range")]
    InvalidTimestamp { value: i64 },

    #[error("Adapter for queue '{queue_id}' has been disposed")]
    AdapterDisposed { queue_id: String },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Provider error ({provider}): {code} - {message}")]
    ProviderError {
        provider: String,
        code: String,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl MessagingError {
    /// Check if error is transient and the operation may be retried by the caller
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConfigurationNotFound { .. } => false,
            Self::UnsupportedMessageType { .. } => false,
            Self::InvalidExpiration { .. } => false,
            Self::InvalidTimestamp { .. } => false,
            Self::AdapterDisposed { .. } => false,
            Self::ConnectionFailed { .. } => true,
            Self::ProviderError { .. } => true,
            Self::Configuration(_) => false,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration for queue '{queue_id}': {message}")]
    Invalid { queue_id: String, message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(err: config::ConfigError) -> Self {
        Self::Parsing {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
