//! In-memory store and projection implementations.
//!
//! These mirror the semantics of the Postgres implementations exactly:
//! version-conditioned writes, unique-key lease acquisition, holder-guarded
//! release. Tests that pass against these pass against Postgres for the
//! same reasons.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use holdfast_core::error::InventoryError;
use holdfast_core::lease::{LeaseLock, OperationClass};
use holdfast_core::projection::{self, StockProjection, StockSnapshot};
use holdfast_core::sku::{HolderId, SkuId, Version};
use holdfast_core::stock::StockRecord;
use holdfast_core::store::{LeaseStore, StockStore};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

/// In-memory [`StockStore`] with real compare-and-swap semantics.
///
/// Concurrent writers observing the same version race exactly as they do
/// against Postgres: one commits, the rest get
/// [`InventoryError::VersionConflict`].
#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    records: Mutex<HashMap<SkuId, StockRecord>>,
    reads: AtomicU64,
}

impl InMemoryStockStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a record directly into the store, bypassing insert semantics.
    pub fn seed(&self, record: StockRecord) {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.insert(record.sku_id.clone(), record);
    }

    /// How many `get` calls the store has served.
    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }
}

impl StockStore for InMemoryStockStore {
    fn get(&self, sku_id: &SkuId) -> BoxFuture<'_, Result<Option<StockRecord>, InventoryError>> {
        let sku_id = sku_id.clone();
        Box::pin(async move {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
            Ok(records.get(&sku_id).cloned())
        })
    }

    fn insert(&self, record: StockRecord) -> BoxFuture<'_, Result<(), InventoryError>> {
        Box::pin(async move {
            let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
            match records.entry(record.sku_id.clone()) {
                Entry::Occupied(_) => Err(InventoryError::AlreadyExists(record.sku_id)),
                Entry::Vacant(entry) => {
                    entry.insert(record);
                    Ok(())
                },
            }
        })
    }

    fn update_if_version(
        &self,
        record: &StockRecord,
        expected: Version,
    ) -> BoxFuture<'_, Result<StockRecord, InventoryError>> {
        let record = record.clone();
        Box::pin(async move {
            let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(stored) = records.get_mut(&record.sku_id) else {
                return Err(InventoryError::NotFound(record.sku_id));
            };
            if stored.version != expected {
                return Err(InventoryError::VersionConflict {
                    sku_id: record.sku_id,
                    expected,
                });
            }
            let mut committed = record;
            committed.version = expected.next();
            *stored = committed.clone();
            Ok(committed)
        })
    }
}

/// Wraps an [`InMemoryStockStore`] and fails the first N version-conditioned
/// writes with [`InventoryError::VersionConflict`], counting every attempt.
///
/// Simulates a contending writer committing between a read and its write
/// without needing actual task interleaving.
#[derive(Debug)]
pub struct ConflictInjectingStockStore {
    inner: Arc<InMemoryStockStore>,
    remaining_conflicts: AtomicU32,
    attempts: AtomicU32,
}

impl ConflictInjectingStockStore {
    /// Wrap `inner`, injecting `conflicts` failures before letting writes
    /// through.
    #[must_use]
    pub const fn new(inner: Arc<InMemoryStockStore>, conflicts: u32) -> Self {
        Self {
            inner,
            remaining_conflicts: AtomicU32::new(conflicts),
            attempts: AtomicU32::new(0),
        }
    }

    /// How many `update_if_version` calls were made, injected or not.
    #[must_use]
    pub fn update_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl StockStore for ConflictInjectingStockStore {
    fn get(&self, sku_id: &SkuId) -> BoxFuture<'_, Result<Option<StockRecord>, InventoryError>> {
        self.inner.get(sku_id)
    }

    fn insert(&self, record: StockRecord) -> BoxFuture<'_, Result<(), InventoryError>> {
        self.inner.insert(record)
    }

    fn update_if_version(
        &self,
        record: &StockRecord,
        expected: Version,
    ) -> BoxFuture<'_, Result<StockRecord, InventoryError>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let inject = self
            .remaining_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if inject {
            let sku_id = record.sku_id.clone();
            return Box::pin(async move {
                Err(InventoryError::VersionConflict { sku_id, expected })
            });
        }
        self.inner.update_if_version(record, expected)
    }
}

/// In-memory [`LeaseStore`] with unique-key insert semantics.
#[derive(Debug, Default)]
pub struct InMemoryLeaseStore {
    leases: Mutex<HashMap<(SkuId, OperationClass), LeaseLock>>,
}

impl InMemoryLeaseStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeaseStore for InMemoryLeaseStore {
    fn try_acquire(&self, lease: LeaseLock) -> BoxFuture<'_, Result<bool, InventoryError>> {
        Box::pin(async move {
            let mut leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
            match leases.entry((lease.sku_id.clone(), lease.operation_class)) {
                Entry::Occupied(_) => Ok(false),
                Entry::Vacant(entry) => {
                    entry.insert(lease);
                    Ok(true)
                },
            }
        })
    }

    fn find(
        &self,
        sku_id: &SkuId,
        operation_class: OperationClass,
    ) -> BoxFuture<'_, Result<Option<LeaseLock>, InventoryError>> {
        let key = (sku_id.clone(), operation_class);
        Box::pin(async move {
            let leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
            Ok(leases.get(&key).cloned())
        })
    }

    fn release(
        &self,
        sku_id: &SkuId,
        operation_class: OperationClass,
        holder_id: &HolderId,
    ) -> BoxFuture<'_, Result<(), InventoryError>> {
        let key = (sku_id.clone(), operation_class);
        let holder_id = holder_id.clone();
        Box::pin(async move {
            let mut leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
            if leases
                .get(&key)
                .is_some_and(|lease| lease.holder_id == holder_id)
            {
                leases.remove(&key);
            }
            Ok(())
        })
    }

    fn delete_expired(
        &self,
        sku_id: &SkuId,
        operation_class: OperationClass,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<u64, InventoryError>> {
        let key = (sku_id.clone(), operation_class);
        Box::pin(async move {
            let mut leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
            if leases.get(&key).is_some_and(|lease| lease.is_expired(now)) {
                leases.remove(&key);
                return Ok(1);
            }
            Ok(0)
        })
    }
}

/// Projection that records every mirrored snapshot.
#[derive(Debug, Default)]
pub struct RecordingProjection {
    snapshots: Mutex<Vec<StockSnapshot>>,
    notify: Notify,
}

impl RecordingProjection {
    /// Create a projection with nothing recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All snapshots mirrored so far, in arrival order.
    #[must_use]
    pub fn snapshots(&self) -> Vec<StockSnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Wait until at least `n` snapshots have arrived, then return them.
    ///
    /// Mirror writes run as detached tasks, so assertions on them need a
    /// rendezvous rather than a racey sleep.
    pub async fn wait_for(&self, n: usize) -> Vec<StockSnapshot> {
        loop {
            let notified = self.notify.notified();
            {
                let snapshots = self
                    .snapshots
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if snapshots.len() >= n {
                    return snapshots.clone();
                }
            }
            notified.await;
        }
    }
}

impl StockProjection for RecordingProjection {
    fn mirror(&self, snapshot: StockSnapshot) -> BoxFuture<'_, projection::Result<()>> {
        Box::pin(async move {
            self.snapshots
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(snapshot);
            self.notify.notify_waiters();
            Ok(())
        })
    }
}

/// Projection whose every write fails, for exercising mirror-failure paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingProjection;

impl StockProjection for FailingProjection {
    fn mirror(&self, _snapshot: StockSnapshot) -> BoxFuture<'_, projection::Result<()>> {
        Box::pin(async {
            Err(projection::ProjectionError::Storage(
                "mirror store offline".to_owned(),
            ))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::test_clock;
    use holdfast_core::environment::Clock;

    fn record(sku: &str, stock: u32) -> StockRecord {
        StockRecord::new(SkuId::new(sku), stock, 1)
    }

    #[tokio::test]
    async fn cas_admits_exactly_one_of_two_racing_writers() {
        let store = InMemoryStockStore::new();
        store.seed(record("SKU-1", 10));

        let observed = store.get(&SkuId::new("SKU-1")).await.unwrap().unwrap();
        let mut a = observed.clone();
        a.current_stock = 11;
        let mut b = observed.clone();
        b.current_stock = 12;

        let committed = store.update_if_version(&a, observed.version).await.unwrap();
        assert_eq!(committed.version.value(), 1);

        let err = store
            .update_if_version(&b, observed.version)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn insert_rejects_duplicates() {
        let store = InMemoryStockStore::new();
        store.insert(record("SKU-1", 10)).await.unwrap();
        let err = store.insert(record("SKU-1", 20)).await.unwrap_err();
        assert_eq!(err, InventoryError::AlreadyExists(SkuId::new("SKU-1")));
    }

    #[tokio::test]
    async fn conflict_injector_counts_and_then_delegates() {
        let inner = Arc::new(InMemoryStockStore::new());
        inner.seed(record("SKU-1", 10));
        let store = ConflictInjectingStockStore::new(inner, 1);

        let observed = store.get(&SkuId::new("SKU-1")).await.unwrap().unwrap();
        let err = store
            .update_if_version(&observed, observed.version)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::VersionConflict { .. }));

        store
            .update_if_version(&observed, observed.version)
            .await
            .unwrap();
        assert_eq!(store.update_attempts(), 2);
    }

    #[tokio::test]
    async fn lease_acquisition_is_first_writer_wins() {
        let store = InMemoryLeaseStore::new();
        let now = test_clock().now();
        let sku = SkuId::new("SKU-1");

        let first = LeaseLock::new(
            sku.clone(),
            OperationClass::Reserve,
            HolderId::new("a"),
            now + chrono::Duration::minutes(5),
        );
        let second = LeaseLock::new(
            sku.clone(),
            OperationClass::Reserve,
            HolderId::new("b"),
            now + chrono::Duration::minutes(5),
        );
        assert!(store.try_acquire(first).await.unwrap());
        assert!(!store.try_acquire(second).await.unwrap());
    }

    #[tokio::test]
    async fn release_is_holder_guarded() {
        let store = InMemoryLeaseStore::new();
        let now = test_clock().now();
        let sku = SkuId::new("SKU-1");

        let lease = LeaseLock::new(
            sku.clone(),
            OperationClass::Deduct,
            HolderId::new("a"),
            now + chrono::Duration::minutes(5),
        );
        store.try_acquire(lease).await.unwrap();

        // Somebody else's release is a no-op.
        store
            .release(&sku, OperationClass::Deduct, &HolderId::new("b"))
            .await
            .unwrap();
        assert!(store.find(&sku, OperationClass::Deduct).await.unwrap().is_some());

        store
            .release(&sku, OperationClass::Deduct, &HolderId::new("a"))
            .await
            .unwrap();
        assert!(store.find(&sku, OperationClass::Deduct).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_expired_spares_live_leases() {
        let store = InMemoryLeaseStore::new();
        let now = test_clock().now();
        let sku = SkuId::new("SKU-1");

        let live = LeaseLock::new(
            sku.clone(),
            OperationClass::Restock,
            HolderId::new("a"),
            now + chrono::Duration::minutes(5),
        );
        store.try_acquire(live).await.unwrap();

        assert_eq!(
            store
                .delete_expired(&sku, OperationClass::Restock, now)
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            store
                .delete_expired(
                    &sku,
                    OperationClass::Restock,
                    now + chrono::Duration::minutes(6)
                )
                .await
                .unwrap(),
            1
        );
    }
}
