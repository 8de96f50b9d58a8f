//! Fixed-window rate limiting.

mod backend;
mod limiter;
mod registry;
mod rules;
mod window;

pub use backend::AdmissionControl;
pub use limiter::{Decision, FixedWindowLimiter};
pub use registry::{LimiterRegistry, SharedLimiter};
pub use rules::{LimitRule, RateLimitRules, DEFAULT_OPERATION};
pub use window::{StoreFailurePolicy, WindowConfig, WindowKey, DEFAULT_KEY_PREFIX, MAX_WINDOW_SECS};
