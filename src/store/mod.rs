//! Counter store abstraction.
//!
//! A counter store is a shared key-value store holding integer counters with
//! TTL-based expiry. The limiter keeps no state of its own; every window lives
//! in the store and ends when the store expires its key.

mod clock;
mod memory;
mod redis_store;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use clock::{Clock, MockClock, SystemClock};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Errors raised by a counter store.
///
/// These are faults, never denials: a limiter must not turn one of these into
/// `false` without an explicit failure policy.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached
    #[error("connection failed: {0}")]
    Connection(String),

    /// The store rejected or failed a command
    #[error("command failed: {0}")]
    Command(String),

    /// The stored value under a key is not an integer counter
    #[error("invalid counter value under {key}")]
    InvalidValue { key: String },
}

/// Result of a single admission attempt against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Whether the attempt was admitted
    pub allowed: bool,
    /// Counter value after the decision
    pub count: i64,
}

impl Admission {
    pub fn allowed(count: i64) -> Self {
        Self { allowed: true, count }
    }

    pub fn denied(count: i64) -> Self {
        Self { allowed: false, count }
    }
}

/// Contract a limiter needs from its counter store.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read the counter under `key`, `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;

    /// Write `value` under `key`, expiring after `ttl`.
    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), StoreError>;

    /// Atomically increment the counter under `key` and return the new value.
    ///
    /// The key's TTL is left untouched.
    async fn increment(&self, key: &str) -> Result<i64, StoreError>;

    /// Remaining lifetime of `key`, `None` if absent or without expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// Run one fixed-window admission for `key`.
    ///
    /// An absent counter is armed at 1 with `ttl`; a counter below
    /// `max_requests` is incremented; anything else is denied without a write.
    ///
    /// This default issues separate get/set/increment calls and is therefore
    /// racy at the window edge and at the threshold. Stores with a native
    /// atomic primitive override it.
    async fn admit(
        &self,
        key: &str,
        max_requests: u64,
        ttl: Duration,
    ) -> Result<Admission, StoreError> {
        match self.get(key).await? {
            None => {
                self.set(key, 1, ttl).await?;
                Ok(Admission::allowed(1))
            }
            Some(current) if below_limit(current, max_requests) => {
                let count = self.increment(key).await?;
                Ok(Admission::allowed(count))
            }
            Some(current) => Ok(Admission::denied(current)),
        }
    }
}

/// Strict comparison used by every admission path.
pub(crate) fn below_limit(current: i64, max_requests: u64) -> bool {
    current < 0 || (current as u64) < max_requests
}
