//! Per-order processing lock port.

use crate::domain::{LockLease, OrderId};
use crate::error::LockError;

/// Mutual exclusion scoped to one order, shared by every server process.
///
/// In-process mutexes do not satisfy this contract: the lock must hold
/// across horizontally scaled instances.
#[async_trait::async_trait]
pub trait PaymentLock: Send + Sync + 'static {
    /// Tries to take the lock for `order_id` for at most `ttl`.
    ///
    /// Returns `Ok(None)` when another holder has it.
    async fn try_acquire(
        &self,
        order_id: OrderId,
        ttl: chrono::Duration,
    ) -> Result<Option<LockLease>, LockError>;

    /// Releases `lease`. Releasing a lease that has expired and been taken
    /// over by another holder leaves the new holder untouched.
    async fn release(&self, lease: &LockLease) -> Result<(), LockError>;
}
