//! Core fixed-window rate limiter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use super::backend::AdmissionControl;
use super::window::{StoreFailurePolicy, WindowConfig, WindowKey};
use crate::error::{RatewardenError, Result};
use crate::store::{Admission, CounterStore, StoreError};

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the attempt may proceed
    pub allowed: bool,
    /// Attempts recorded in the current window
    pub count: u64,
    /// Configured ceiling per window
    pub limit: u64,
    /// Attempts left in the current window
    pub remaining: u64,
}

/// Fixed-window limiter for a single operation class.
///
/// All mutable state lives in the counter store; the limiter only holds its
/// configuration and a handle to the store, so it can be shared freely
/// across tasks.
pub struct FixedWindowLimiter<S: CounterStore + ?Sized> {
    store: Arc<S>,
    config: WindowConfig,
}

impl<S: CounterStore + ?Sized> FixedWindowLimiter<S> {
    /// Create a limiter over `store`.
    ///
    /// Fails if the configuration admits nothing or has no usable window.
    pub fn new(store: Arc<S>, config: WindowConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn key(&self) -> &WindowKey {
        &self.config.key
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Decide whether the current attempt is admitted, recording it if so.
    pub async fn is_allowed(&self) -> Result<bool> {
        Ok(self.check().await?.allowed)
    }

    /// Like [`is_allowed`](Self::is_allowed), with the window's counters.
    pub async fn check(&self) -> Result<Decision> {
        let key = self.config.key.as_str();
        let limit = self.config.max_requests;

        trace!(key = %key, limit = limit, "Checking rate limit");

        let admission = match self.store.admit(key, limit, self.config.window).await {
            Ok(admission) => admission,
            Err(e) => self.on_store_failure(e)?,
        };

        let count = u64::try_from(admission.count).unwrap_or(0);
        if !admission.allowed {
            debug!(key = %key, count = count, limit = limit, "Rate limit exceeded");
        }

        let remaining = if admission.allowed {
            limit.saturating_sub(count)
        } else {
            0
        };

        Ok(Decision {
            allowed: admission.allowed,
            count,
            limit,
            remaining,
        })
    }

    /// Admit the attempt or fail with [`RatewardenError::RateLimitExceeded`].
    pub async fn ensure_allowed(&self) -> Result<()> {
        if self.is_allowed().await? {
            return Ok(());
        }

        // A failed TTL lookup must not mask the denial itself.
        let retry_after = self.time_until_reset().await.unwrap_or(None);
        Err(RatewardenError::RateLimitExceeded {
            key: self.config.key.to_string(),
            retry_after,
        })
    }

    /// Attempts recorded in the current window, zero if none is open.
    pub async fn current_count(&self) -> Result<u64> {
        let value = self.store.get(self.config.key.as_str()).await?;
        Ok(value.and_then(|v| u64::try_from(v).ok()).unwrap_or(0))
    }

    /// Time until the current window expires, `None` if none is open.
    pub async fn time_until_reset(&self) -> Result<Option<Duration>> {
        Ok(self.store.ttl(self.config.key.as_str()).await?)
    }

    fn on_store_failure(&self, err: StoreError) -> Result<Admission> {
        match self.config.on_store_error {
            StoreFailurePolicy::Propagate => {
                warn!(key = %self.config.key, error = %err, "Counter store failed");
                Err(err.into())
            }
            StoreFailurePolicy::FailOpen => {
                warn!(key = %self.config.key, error = %err, "Counter store failed, admitting");
                Ok(Admission::allowed(0))
            }
            StoreFailurePolicy::FailClosed => {
                warn!(key = %self.config.key, error = %err, "Counter store failed, denying");
                let ceiling = i64::try_from(self.config.max_requests).unwrap_or(i64::MAX);
                Ok(Admission::denied(ceiling))
            }
        }
    }
}

#[async_trait]
impl<S: CounterStore + ?Sized> AdmissionControl for FixedWindowLimiter<S> {
    async fn is_allowed(&self) -> Result<bool> {
        FixedWindowLimiter::is_allowed(self).await
    }

    async fn ensure_allowed(&self) -> Result<()> {
        FixedWindowLimiter::ensure_allowed(self).await
    }
}
