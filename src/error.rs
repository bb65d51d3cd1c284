//! Error types for the Lifekit service.

use std::time::Duration;
use thiserror::Error;

/// Main error type for Lifekit operations.
#[derive(Error, Debug)]
pub enum LifekitError {
    /// Configuration-related errors, including invalid rate limit policies
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller exhausted its rate limit policy
    #[error("Rate limit exceeded")]
    RateLimited {
        /// Time until the call would fit in the window
        retry_after: Duration,
    },

    /// Request input failed validation
    #[error("{0}")]
    Validation(String),

    /// A required external service has no credentials
    #[error("{0}")]
    NotConfigured(String),

    /// An external service call failed or returned an unusable reply
    #[error("{0}")]
    Upstream(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LifekitError {
    /// Status code a transport layer should surface for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            LifekitError::RateLimited { .. } => 429,
            LifekitError::Validation(_) => 400,
            _ => 500,
        }
    }

    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LifekitError::RateLimited { .. })
    }
}

impl From<config::ConfigError> for LifekitError {
    fn from(e: config::ConfigError) -> Self {
        LifekitError::Config(e.to_string())
    }
}

/// Result type alias for Lifekit operations.
pub type Result<T> = std::result::Result<T, LifekitError>;
