//! In-process counter store.
//!
//! Counters live in a `DashMap`; each entry carries its own expiry instant,
//! checked lazily against the injected clock. `admit` runs under the entry's
//! shard lock, so concurrent callers in one process never over-admit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::trace;

use super::clock::{Clock, SystemClock};
use super::{below_limit, Admission, CounterStore, StoreError};

#[derive(Debug, Clone, Copy)]
struct Slot {
    value: i64,
    expires_at: Option<Instant>,
}

impl Slot {
    fn armed(now: Instant, ttl: Duration) -> Result<Self, StoreError> {
        Ok(Self {
            value: 1,
            expires_at: Some(expiry(now, ttl)?),
        })
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

fn expiry(now: Instant, ttl: Duration) -> Result<Instant, StoreError> {
    now.checked_add(ttl)
        .ok_or_else(|| StoreError::Command(format!("ttl of {:?} is out of range", ttl)))
}

/// Counter store kept in process memory.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Slot>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create a store driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Create a store driven by the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let now = self.clock.now();
        self.entries.retain(|_, slot| !slot.is_expired(now));
    }

    /// Remove all counters.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of live (unexpired) counters.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let now = self.clock.now();
        Ok(self
            .entries
            .get(key)
            .filter(|slot| !slot.is_expired(now))
            .map(|slot| slot.value))
    }

    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = expiry(self.clock.now(), ttl)?;
        self.entries.insert(
            key.to_string(),
            Slot {
                value,
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let now = self.clock.now();
        let mut slot = self.entries.entry(key.to_string()).or_insert(Slot {
            value: 0,
            expires_at: None,
        });
        // An expired key behaves as absent: it restarts at zero without expiry.
        if slot.is_expired(now) {
            *slot = Slot {
                value: 0,
                expires_at: None,
            };
        }
        slot.value += 1;
        Ok(slot.value)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = self.clock.now();
        Ok(self
            .entries
            .get(key)
            .filter(|slot| !slot.is_expired(now))
            .and_then(|slot| slot.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn admit(
        &self,
        key: &str,
        max_requests: u64,
        ttl: Duration,
    ) -> Result<Admission, StoreError> {
        let now = self.clock.now();

        let admission = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                if slot.is_expired(now) {
                    trace!(key = %key, "Window expired, re-arming");
                    *slot = Slot::armed(now, ttl)?;
                    Admission::allowed(slot.value)
                } else if below_limit(slot.value, max_requests) {
                    slot.value += 1;
                    Admission::allowed(slot.value)
                } else {
                    Admission::denied(slot.value)
                }
            }
            Entry::Vacant(vacant) => {
                trace!(key = %key, "Arming new window");
                vacant.insert(Slot::armed(now, ttl)?);
                Admission::allowed(1)
            }
        };

        Ok(admission)
    }
}
