//! Reservation façade: the single entry point used by order/cart callers.
//!
//! Every write operation takes the optimistic path first and escalates to
//! the leased-lock coordinator only when the engine reports
//! `RetriesExhausted`. Business-rule failures (`InsufficientStock`,
//! `NotFound`, `InvalidQuantity`) propagate immediately without fallback —
//! a lock cannot fix a business-rule violation.
//!
//! After every successful commit the façade mirrors the new counts onto the
//! read-side projection as a detached, non-blocking task. Mirror failure is
//! logged and counted, never surfaced; inventory correctness never depends
//! on the projection being fresh.

use crate::lease_lock::{LeaseCoordinator, LeasePolicy};
use crate::optimistic::{OptimisticEngine, RetryPolicy};
use holdfast_core::environment::{Clock, Sleeper};
use holdfast_core::error::InventoryError;
use holdfast_core::projection::{StockProjection, StockSnapshot};
use holdfast_core::sku::{HolderId, SkuId};
use holdfast_core::stock::{StockRecord, StockTransition};
use holdfast_core::store::{LeaseStore, StockStore};
use std::sync::Arc;

/// The public contract of the reservation subsystem.
///
/// # Example
///
/// ```ignore
/// use holdfast_runtime::facade::InventoryService;
///
/// let service = InventoryService::new(stock_store, lease_store, projection, clock, sleeper);
/// let record = service
///     .reserve_stock(&sku, 2, &HolderId::new("order-8842"))
///     .await?;
/// ```
pub struct InventoryService {
    stock_store: Arc<dyn StockStore>,
    projection: Arc<dyn StockProjection>,
    clock: Arc<dyn Clock>,
    engine: OptimisticEngine,
    coordinator: LeaseCoordinator,
}

impl InventoryService {
    /// Create a service with the default retry and lease policies.
    #[must_use]
    pub fn new(
        stock_store: Arc<dyn StockStore>,
        lease_store: Arc<dyn LeaseStore>,
        projection: Arc<dyn StockProjection>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self::with_policies(
            stock_store,
            lease_store,
            projection,
            clock,
            sleeper,
            RetryPolicy::default(),
            LeasePolicy::default(),
        )
    }

    /// Create a service with explicit policies.
    #[must_use]
    pub fn with_policies(
        stock_store: Arc<dyn StockStore>,
        lease_store: Arc<dyn LeaseStore>,
        projection: Arc<dyn StockProjection>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
        retry_policy: RetryPolicy,
        lease_policy: LeasePolicy,
    ) -> Self {
        let engine = OptimisticEngine::new(stock_store.clone(), sleeper.clone(), retry_policy);
        let coordinator = LeaseCoordinator::new(
            stock_store.clone(),
            lease_store,
            clock.clone(),
            sleeper,
            lease_policy,
        );
        Self {
            stock_store,
            projection,
            clock,
            engine,
            coordinator,
        }
    }

    /// Provision the stock record for a new SKU.
    ///
    /// Called once at product/SKU creation time; records are never
    /// recreated or physically deleted.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::AlreadyExists`]: the SKU is already provisioned
    /// - [`InventoryError::Storage`]: store access failed
    pub async fn create_stock(
        &self,
        sku_id: SkuId,
        initial_stock: u32,
        warning_threshold: u32,
    ) -> Result<StockRecord, InventoryError> {
        let record = StockRecord::new(sku_id, initial_stock, warning_threshold);
        self.stock_store.insert(record.clone()).await?;
        self.dispatch_mirror(&record);
        Ok(record)
    }

    /// Hold `qty` units against the caller's in-flight order.
    ///
    /// # Errors
    ///
    /// See [`Self::apply`].
    pub async fn reserve_stock(
        &self,
        sku_id: &SkuId,
        qty: u32,
        operation_id: &HolderId,
    ) -> Result<StockRecord, InventoryError> {
        self.apply(sku_id, StockTransition::Reserve(qty), operation_id)
            .await
    }

    /// Turn `qty` previously reserved units into an outbound shipment.
    ///
    /// # Errors
    ///
    /// See [`Self::apply`].
    pub async fn confirm_reserve(
        &self,
        sku_id: &SkuId,
        qty: u32,
        operation_id: &HolderId,
    ) -> Result<StockRecord, InventoryError> {
        self.apply(sku_id, StockTransition::ConfirmReserve(qty), operation_id)
            .await
    }

    /// Release up to `qty` previously reserved units back to the pool.
    ///
    /// # Errors
    ///
    /// See [`Self::apply`].
    pub async fn cancel_reserve(
        &self,
        sku_id: &SkuId,
        qty: u32,
        operation_id: &HolderId,
    ) -> Result<StockRecord, InventoryError> {
        self.apply(sku_id, StockTransition::CancelReserve(qty), operation_id)
            .await
    }

    /// Add `qty` units of new stock.
    ///
    /// # Errors
    ///
    /// See [`Self::apply`].
    pub async fn increase_stock(
        &self,
        sku_id: &SkuId,
        qty: u32,
        operation_id: &HolderId,
    ) -> Result<StockRecord, InventoryError> {
        self.apply(sku_id, StockTransition::Increase(qty), operation_id)
            .await
    }

    /// Remove `qty` unreserved units.
    ///
    /// # Errors
    ///
    /// See [`Self::apply`].
    pub async fn decrease_stock(
        &self,
        sku_id: &SkuId,
        qty: u32,
        operation_id: &HolderId,
    ) -> Result<StockRecord, InventoryError> {
        self.apply(sku_id, StockTransition::Decrease(qty), operation_id)
            .await
    }

    /// Write off `qty` unreserved units as damaged.
    ///
    /// # Errors
    ///
    /// See [`Self::apply`].
    pub async fn record_damage(
        &self,
        sku_id: &SkuId,
        qty: u32,
        operation_id: &HolderId,
    ) -> Result<StockRecord, InventoryError> {
        self.apply(sku_id, StockTransition::RecordDamage(qty), operation_id)
            .await
    }

    /// Record a stock-take against the SKU at the current instant.
    ///
    /// # Errors
    ///
    /// See [`Self::apply`].
    pub async fn record_stock_check(
        &self,
        sku_id: &SkuId,
        operation_id: &HolderId,
    ) -> Result<StockRecord, InventoryError> {
        let at = self.clock.now();
        self.apply(sku_id, StockTransition::Check { at }, operation_id)
            .await
    }

    /// Read the current committed record for a SKU. Pure read, no locking.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::NotFound`]: the SKU has no stock record
    /// - [`InventoryError::Storage`]: store access failed
    pub async fn get_inventory(&self, sku_id: &SkuId) -> Result<StockRecord, InventoryError> {
        match self.stock_store.get(sku_id).await? {
            Some(record) => Ok(record),
            None => Err(InventoryError::NotFound(sku_id.clone())),
        }
    }

    /// Whether at least `qty` units are currently available.
    ///
    /// Read-derived convenience; a missing record reads as `false` rather
    /// than an error.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::InvalidQuantity`]: non-positive quantity,
    ///   rejected before any store access
    /// - [`InventoryError::Storage`]: store access failed
    pub async fn has_enough_stock(
        &self,
        sku_id: &SkuId,
        qty: u32,
    ) -> Result<bool, InventoryError> {
        if qty == 0 {
            return Err(InventoryError::InvalidQuantity { qty: 0 });
        }
        Ok(self
            .stock_store
            .get(sku_id)
            .await?
            .is_some_and(|record| record.available_stock() >= qty))
    }

    /// Whether current stock has fallen to the SKU's warning threshold.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::NotFound`]: the SKU has no stock record
    /// - [`InventoryError::Storage`]: store access failed
    pub async fn is_low_stock(&self, sku_id: &SkuId) -> Result<bool, InventoryError> {
        Ok(self.get_inventory(sku_id).await?.is_low_stock())
    }

    /// Apply one transition, optimistic-first with lock fallback.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::InvalidQuantity`]: non-positive quantity,
    ///   rejected before any store access
    /// - [`InventoryError::NotFound`] /
    ///   [`InventoryError::InsufficientStock`]: terminal business outcomes,
    ///   reported as-is with no fallback
    /// - [`InventoryError::LockTimeout`]: the fallback path could not
    ///   acquire exclusivity; transient, the caller may retry the whole
    ///   operation after a short delay
    /// - [`InventoryError::Storage`]: store access failed
    pub async fn apply(
        &self,
        sku_id: &SkuId,
        transition: StockTransition,
        operation_id: &HolderId,
    ) -> Result<StockRecord, InventoryError> {
        if let Some(qty) = transition.quantity() {
            if qty == 0 {
                return Err(InventoryError::InvalidQuantity { qty: 0 });
            }
        }

        let record = match self.engine.apply(sku_id, transition).await {
            Ok(record) => record,
            Err(InventoryError::RetriesExhausted { attempts, .. }) => {
                metrics::counter!("holdfast_lock_fallbacks_total").increment(1);
                tracing::info!(
                    sku = %sku_id,
                    operation = %operation_id,
                    attempts,
                    "optimistic path exhausted, falling back to leased lock"
                );
                self.coordinator
                    .apply_locked(sku_id, transition, operation_id)
                    .await?
            },
            Err(err) => return Err(err),
        };

        self.dispatch_mirror(&record);
        Ok(record)
    }

    /// Fire-and-forget mirror of a committed record onto the projection.
    fn dispatch_mirror(&self, record: &StockRecord) {
        let snapshot = StockSnapshot::of(record, self.clock.now());
        let projection = self.projection.clone();
        drop(tokio::spawn(async move {
            let sku = snapshot.sku_id.clone();
            let version = snapshot.version;
            if let Err(err) = projection.mirror(snapshot).await {
                metrics::counter!("holdfast_mirror_failures_total").increment(1);
                tracing::warn!(
                    sku = %sku,
                    version = %version,
                    error = %err,
                    "stock mirror write failed; projection will lag"
                );
            }
        }));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use holdfast_testing::mocks::{InstantSleeper, test_clock};
    use holdfast_testing::stores::{
        ConflictInjectingStockStore, FailingProjection, InMemoryLeaseStore, InMemoryStockStore,
        RecordingProjection,
    };

    struct Fixture {
        stock: Arc<InMemoryStockStore>,
        projection: Arc<RecordingProjection>,
        service: InventoryService,
    }

    fn fixture() -> Fixture {
        let stock = Arc::new(InMemoryStockStore::new());
        let projection = Arc::new(RecordingProjection::new());
        let service = InventoryService::new(
            stock.clone(),
            Arc::new(InMemoryLeaseStore::new()),
            projection.clone(),
            Arc::new(test_clock()),
            Arc::new(InstantSleeper::default()),
        );
        Fixture {
            stock,
            projection,
            service,
        }
    }

    #[tokio::test]
    async fn reserve_then_confirm_scenario() {
        let f = fixture();
        let sku = SkuId::new("SKU-100");
        let op = HolderId::new("order-1");
        f.service.create_stock(sku.clone(), 100, 10).await.unwrap();

        let record = f.service.reserve_stock(&sku, 10, &op).await.unwrap();
        assert_eq!(record.reserved_stock, 10);
        assert_eq!(record.available_stock(), 90);

        let record = f.service.confirm_reserve(&sku, 10, &op).await.unwrap();
        assert_eq!(record.reserved_stock, 0);
        assert_eq!(record.current_stock, 90);
        assert_eq!(record.outbound_total, 10);

        // create + reserve + confirm each dispatched a mirror write;
        // detached tasks may land out of order, so pick the freshest.
        let snapshots = f.projection.wait_for(3).await;
        let freshest = snapshots.iter().max_by_key(|s| s.version).unwrap();
        assert_eq!(freshest.current_stock, 90);
        assert_eq!(freshest.available_stock, 90);
    }

    #[tokio::test]
    async fn zero_quantity_rejected_before_store_access() {
        let f = fixture();
        let sku = SkuId::new("SKU-100");
        let err = f
            .service
            .reserve_stock(&sku, 0, &HolderId::new("order-1"))
            .await
            .unwrap_err();
        assert_eq!(err, InventoryError::InvalidQuantity { qty: 0 });

        // The availability check validates its quantity the same way as
        // the write operations.
        let err = f.service.has_enough_stock(&sku, 0).await.unwrap_err();
        assert_eq!(err, InventoryError::InvalidQuantity { qty: 0 });

        assert_eq!(f.stock.read_count(), 0);
    }

    #[tokio::test]
    async fn insufficient_stock_does_not_fall_back() {
        let f = fixture();
        let sku = SkuId::new("SKU-100");
        f.service.create_stock(sku.clone(), 50, 5).await.unwrap();

        let err = f
            .service
            .reserve_stock(&sku, 100, &HolderId::new("order-1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InventoryError::InsufficientStock {
                requested: 100,
                available: 50,
                ..
            }
        ));
        // Terminal: state unchanged.
        let record = f.service.get_inventory(&sku).await.unwrap();
        assert_eq!(record.reserved_stock, 0);
        assert_eq!(record.version.value(), 0);
    }

    #[tokio::test]
    async fn exhausted_retries_fall_back_to_lock_path() {
        let inner = Arc::new(InMemoryStockStore::new());
        let sku = SkuId::new("SKU-HOT");
        inner.seed(StockRecord::new(sku.clone(), 100, 10));

        // Enough conflicts to exhaust the optimistic engine (4 attempts),
        // then a few more absorbed by the lock path's re-read loop.
        let store = Arc::new(ConflictInjectingStockStore::new(inner, 6));
        let projection = Arc::new(RecordingProjection::new());
        let service = InventoryService::new(
            store,
            Arc::new(InMemoryLeaseStore::new()),
            projection,
            Arc::new(test_clock()),
            Arc::new(InstantSleeper::default()),
        );

        let record = service
            .reserve_stock(&sku, 2, &HolderId::new("order-1"))
            .await
            .unwrap();
        assert_eq!(record.reserved_stock, 2);
    }

    #[tokio::test]
    async fn mirror_failure_never_fails_the_operation() {
        let stock = Arc::new(InMemoryStockStore::new());
        let service = InventoryService::new(
            stock,
            Arc::new(InMemoryLeaseStore::new()),
            Arc::new(FailingProjection),
            Arc::new(test_clock()),
            Arc::new(InstantSleeper::default()),
        );

        let sku = SkuId::new("SKU-100");
        service.create_stock(sku.clone(), 10, 1).await.unwrap();
        let record = service
            .reserve_stock(&sku, 3, &HolderId::new("order-1"))
            .await
            .unwrap();
        assert_eq!(record.reserved_stock, 3);
    }

    #[tokio::test]
    async fn read_paths() {
        let f = fixture();
        let sku = SkuId::new("SKU-100");
        f.service.create_stock(sku.clone(), 10, 8).await.unwrap();

        assert!(f.service.has_enough_stock(&sku, 10).await.unwrap());
        assert!(!f.service.has_enough_stock(&sku, 11).await.unwrap());
        assert!(
            !f.service
                .has_enough_stock(&SkuId::new("SKU-NONE"), 1)
                .await
                .unwrap()
        );

        // get_inventory twice with no writes in between is identical.
        let a = f.service.get_inventory(&sku).await.unwrap();
        let b = f.service.get_inventory(&sku).await.unwrap();
        assert_eq!(a, b);

        // 10 <= warning threshold 8 is false; decrease to threshold.
        assert!(!f.service.is_low_stock(&sku).await.unwrap());
        f.service
            .decrease_stock(&sku, 2, &HolderId::new("adj-1"))
            .await
            .unwrap();
        assert!(f.service.is_low_stock(&sku).await.unwrap());
    }

    #[tokio::test]
    async fn stock_check_stamps_the_clock() {
        let f = fixture();
        let sku = SkuId::new("SKU-100");
        f.service.create_stock(sku.clone(), 10, 1).await.unwrap();

        let record = f
            .service
            .record_stock_check(&sku, &HolderId::new("audit-1"))
            .await
            .unwrap();
        assert_eq!(record.last_check_time, Some(test_clock().now()));
        assert_eq!(record.version.value(), 1);
    }

    #[tokio::test]
    async fn create_twice_is_rejected() {
        let f = fixture();
        let sku = SkuId::new("SKU-100");
        f.service.create_stock(sku.clone(), 10, 1).await.unwrap();
        let err = f.service.create_stock(sku.clone(), 5, 1).await.unwrap_err();
        assert_eq!(err, InventoryError::AlreadyExists(sku));
    }
}
