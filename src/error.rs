//! Error types for Ratewarden.

use std::time::Duration;
use thiserror::Error;

use crate::store::StoreError;

/// Main error type for Ratewarden operations.
#[derive(Error, Debug)]
pub enum RatewardenError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The counter store could not be reached or answered with an error
    #[error("Counter store error: {0}")]
    Store(#[from] StoreError),

    /// The attempt was denied by a limiter.
    ///
    /// Only produced by callers that ask for a hard failure on denial
    /// (`ensure_allowed`); `is_allowed` reports denial as `Ok(false)`.
    #[error("Rate limit exceeded for {key}")]
    RateLimitExceeded {
        /// Window key of the limiter that denied the attempt
        key: String,
        /// Time until the current window expires, if the store knows it
        retry_after: Option<Duration>,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RatewardenError {
    /// HTTP-equivalent status code for surfacing this error to an end user.
    pub const fn status_code(&self) -> u16 {
        match self {
            RatewardenError::RateLimitExceeded { .. } => 429,
            RatewardenError::Store(_) => 503,
            RatewardenError::Config(_) | RatewardenError::Io(_) => 500,
        }
    }

    /// Whether this error is a denial rather than a fault.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RatewardenError::RateLimitExceeded { .. })
    }
}

/// Result type alias for Ratewarden operations.
pub type Result<T> = std::result::Result<T, RatewardenError>;
