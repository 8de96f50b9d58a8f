//! Admission trait for abstracting over limiter implementations.

use async_trait::async_trait;

use crate::error::Result;

/// Trait callers depend on before performing a rate-limited operation.
///
/// A caller invokes this once per inbound operation and aborts the operation
/// when the attempt is denied. Denial is `Ok(false)`; `Err` always means the
/// decision itself could not be made.
#[async_trait]
pub trait AdmissionControl: Send + Sync {
    /// Decide whether the current attempt may proceed.
    async fn is_allowed(&self) -> Result<bool>;

    /// Proceed or fail with `RateLimitExceeded`.
    async fn ensure_allowed(&self) -> Result<()>;
}
