use std::collections::HashMap;
use std::sync::Arc;

use modgate_domain::BulkTargetType;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Guards the module catalog.
///
/// Catalog mutations take the write side; permission writes take the read
/// side so they validate against a catalog that cannot change underneath
/// them.
#[derive(Clone, Default)]
pub struct CatalogLock {
    inner: Arc<RwLock<()>>,
}

impl CatalogLock {
    /// Creates an unlocked catalog lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn read(&self) -> OwnedRwLockReadGuard<()> {
        Arc::clone(&self.inner).read_owned().await
    }

    pub(crate) async fn write(&self) -> OwnedRwLockWriteGuard<()> {
        Arc::clone(&self.inner).write_owned().await
    }
}

/// Per-target write locks for roles and plans.
///
/// One mutex exists per `(target type, target id)`; writes to different
/// targets never contend. Entries nobody holds or waits on are pruned on the
/// next acquisition, so ids that never resolve to a record do not accumulate.
#[derive(Clone, Default)]
pub(crate) struct TargetLocks {
    locks: Arc<Mutex<HashMap<(BulkTargetType, String), Arc<Mutex<()>>>>>,
}

impl TargetLocks {
    pub(crate) async fn acquire(
        &self,
        target_type: BulkTargetType,
        target_id: &str,
    ) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(
                locks
                    .entry((target_type, target_id.to_owned()))
                    .or_default(),
            )
        };

        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use modgate_domain::BulkTargetType;

    use super::TargetLocks;

    #[tokio::test]
    async fn same_target_is_serialized() {
        let locks = TargetLocks::default();
        let guard = locks.acquire(BulkTargetType::Role, "manager").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(BulkTargetType::Role, "manager").await;
            })
        };

        tokio::task::yield_now().await;
        assert!(!contender.is_finished());
        drop(guard);
        assert!(
            tokio::time::timeout(Duration::from_secs(1), contender)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn released_locks_are_pruned() {
        let locks = TargetLocks::default();
        for target_id in ["ghost-1", "ghost-2", "ghost-3"] {
            drop(locks.acquire(BulkTargetType::Role, target_id).await);
        }

        let held = locks.acquire(BulkTargetType::Role, "manager").await;
        assert_eq!(locks.tracked().await, 1);

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(BulkTargetType::Role, "manager").await;
            })
        };
        tokio::task::yield_now().await;

        drop(locks.acquire(BulkTargetType::Role, "viewer").await);
        assert!(!waiter.is_finished());

        drop(held);
        assert!(
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .is_ok()
        );
        drop(locks.acquire(BulkTargetType::Role, "viewer").await);
        assert_eq!(locks.tracked().await, 1);
    }

    #[tokio::test]
    async fn different_targets_do_not_contend() {
        let locks = Arc::new(TargetLocks::default());
        let _role = locks.acquire(BulkTargetType::Role, "manager").await;
        let _plan = locks.acquire(BulkTargetType::Subscription, "manager").await;
        let _other = locks.acquire(BulkTargetType::Role, "viewer").await;
    }
}
