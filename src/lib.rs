//! Ratewarden - fixed-window admission control.
//!
//! A limiter decides, for one operation class, whether the current attempt
//! may proceed. Its only state is a counter with a TTL held in a shared
//! counter store (Redis, or process memory for single-node use), so any
//! number of processes pointed at the same store share one window.

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod store;

pub use error::{RatewardenError, Result};
pub use ratelimit::{AdmissionControl, FixedWindowLimiter, WindowConfig};
pub use store::{CounterStore, MemoryStore, RedisStore};
