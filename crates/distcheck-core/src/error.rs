//! Error types for the distribution monitor
//!
//! This module defines the errors returned by zone API implementations,
//! configuration validation and startup. Failures of a single check cycle
//! are captured in the cycle's result instead (see [`crate::check::CheckError`]).

use thiserror::Error;

/// Result type alias for distribution monitor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the distribution monitor
#[derive(Error, Debug)]
pub enum Error {
    /// Zone API errors that don't fit a more specific variant
    #[error("Zone API error: {0}")]
    Api(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Record or zone not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
        /// Whether the provider reported a transient condition (5xx)
        transient: bool,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a zone API error
    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            transient: false,
        }
    }

    /// Create a provider-specific error for a transient condition
    pub fn provider_transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            transient: true,
        }
    }

    /// Whether the failure is likely to clear up on its own
    ///
    /// Rate limiting, transport errors and provider 5xx responses are
    /// temporary; authentication, validation and not-found errors are not.
    pub fn is_temporary(&self) -> bool {
        match self {
            Self::RateLimited(_) | Self::Http(_) => true,
            Self::Provider { transient, .. } => *transient,
            _ => false,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
