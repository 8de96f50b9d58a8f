//! Window key and window configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RatewardenError, Result};

/// Key prefix used when none is configured.
pub const DEFAULT_KEY_PREFIX: &str = "rate_limiter:";

/// Longest accepted window (one year).
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

/// Identifies one logical operation class in the counter store.
///
/// The key is fixed for the lifetime of a limiter and never carries
/// per-request data, so every caller of that class shares one window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey(String);

impl WindowKey {
    /// Build a key from a store prefix and an operation class name.
    pub fn new(prefix: &str, operation: &str) -> Self {
        Self(format!("{}{}", prefix, operation))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WindowKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a limiter does when the counter store fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreFailurePolicy {
    /// Return the store error to the caller
    #[default]
    Propagate,
    /// Admit the attempt
    FailOpen,
    /// Deny the attempt
    FailClosed,
}

/// Immutable parameters of one fixed-window limiter.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    /// Counter key in the store
    pub key: WindowKey,
    /// Attempts admitted per window
    pub max_requests: u64,
    /// Window length, used as the counter's TTL
    pub window: Duration,
    /// Behaviour on store failure
    pub on_store_error: StoreFailurePolicy,
}

impl WindowConfig {
    pub fn new(key: impl Into<WindowKey>, max_requests: u64, window_seconds: u64) -> Self {
        Self {
            key: key.into(),
            max_requests,
            window: Duration::from_secs(window_seconds),
            on_store_error: StoreFailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, policy: StoreFailurePolicy) -> Self {
        self.on_store_error = policy;
        self
    }

    /// Reject zero limits, sub-second windows and windows over a year.
    pub fn validate(&self) -> Result<()> {
        if self.key.as_str().is_empty() {
            return Err(RatewardenError::Config("window key must not be empty".into()));
        }
        if self.max_requests == 0 {
            return Err(RatewardenError::Config(format!(
                "max_requests for {} must be at least 1",
                self.key
            )));
        }
        if self.window.as_secs() == 0 {
            return Err(RatewardenError::Config(format!(
                "window for {} must be at least one second",
                self.key
            )));
        }
        if self.window.as_secs() > MAX_WINDOW_SECS {
            return Err(RatewardenError::Config(format!(
                "window for {} must not exceed {} seconds",
                self.key, MAX_WINDOW_SECS
            )));
        }
        Ok(())
    }
}
