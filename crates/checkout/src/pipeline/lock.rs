//! Per-order serialization of finalization.

use std::sync::Arc;
use std::time::Duration;

use commerce_mailchimp_core::OrderId;
use moka::future::Cache;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Idle locks are dropped after ten minutes. A held lock is never idle for
/// longer than one provider request, which is bounded by the client timeout.
pub(crate) const IDLE: Duration = Duration::from_secs(600);

/// One async mutex per order, so concurrent transitions of the same order
/// finalize one after the other.
#[derive(Clone)]
pub struct OrderLocks {
    locks: Cache<OrderId, Arc<Mutex<()>>>,
}

impl Default for OrderLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderLocks {
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: Cache::builder().time_to_idle(IDLE).build(),
        }
    }

    /// Wait for exclusive access to `order_id`.
    pub async fn acquire(&self, order_id: OrderId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .get_with(order_id, async { Arc::new(Mutex::new(())) })
            .await;
        lock.lock_owned().await
    }
}
