//! Persistence traits for stock records and lease locks.
//!
//! # Design
//!
//! The subsystem needs exactly two guarantees from its store:
//!
//! - **update-if-version-matches** semantics for [`StockRecord`] — only one
//!   writer observing version V may commit V+1; everyone else gets
//!   [`InventoryError::VersionConflict`] and must re-read;
//! - **insert-fails-on-duplicate-key** semantics for [`LeaseLock`]
//!   acquisition.
//!
//! Both are satisfiable by any relational store with a unique index and row
//! versioning, or by a key-value store with compare-and-swap.
//!
//! # Implementations
//!
//! - `PostgresStockStore` / `PostgresLeaseStore` (in `holdfast-postgres`):
//!   production implementations
//! - `InMemoryStockStore` / `InMemoryLeaseStore` (in `holdfast-testing`):
//!   fast, deterministic testing
//!
//! # Dyn Compatibility
//!
//! These traits return boxed futures instead of using `async fn` so they can
//! be held as trait objects (`Arc<dyn StockStore>`) by the engine, the
//! coordinator, and the façade.

use crate::error::InventoryError;
use crate::lease::{LeaseLock, OperationClass};
use crate::sku::{HolderId, SkuId, Version};
use crate::stock::StockRecord;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

/// Store abstraction for per-SKU stock records.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; any number of callers across any
/// number of processes may race on the same record, and the store is the one
/// place that linearizes them (via the version counter).
pub trait StockStore: Send + Sync {
    /// Load the current committed record for a SKU.
    ///
    /// Reads are always "latest committed" and never wait on a lease.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::Storage`]: store access failed
    fn get(&self, sku_id: &SkuId) -> BoxFuture<'_, Result<Option<StockRecord>, InventoryError>>;

    /// Insert a brand-new record at SKU provisioning time.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::AlreadyExists`]: a record for this SKU exists
    /// - [`InventoryError::Storage`]: store access failed
    fn insert(&self, record: StockRecord) -> BoxFuture<'_, Result<(), InventoryError>>;

    /// Write back a mutated record, conditioned on the stored version still
    /// being `expected`.
    ///
    /// On success the store bumps the version to `expected.next()` and
    /// returns the committed record. The caller's in-memory `record.version`
    /// is ignored; the bump happens at the commit point only.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::VersionConflict`]: another writer committed first;
    ///   discard the attempt and retry from a fresh read
    /// - [`InventoryError::NotFound`]: no record exists for the SKU
    /// - [`InventoryError::Storage`]: store access failed
    fn update_if_version(
        &self,
        record: &StockRecord,
        expected: Version,
    ) -> BoxFuture<'_, Result<StockRecord, InventoryError>>;
}

/// Store abstraction for leased locks.
///
/// At most one row may exist per (`sku_id`, `operation_class`) pair; the
/// store enforces this with a unique key, and acquisition is an insert that
/// either lands or reports the conflict.
pub trait LeaseStore: Send + Sync {
    /// Attempt to insert `lease` as the active row for its key.
    ///
    /// Returns `true` if the insert landed (lock acquired) and `false` if a
    /// row already exists for the key (already held).
    ///
    /// # Errors
    ///
    /// - [`InventoryError::Storage`]: store access failed
    fn try_acquire(&self, lease: LeaseLock) -> BoxFuture<'_, Result<bool, InventoryError>>;

    /// Read the current holder's row for a key, if any.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::Storage`]: store access failed
    fn find(
        &self,
        sku_id: &SkuId,
        operation_class: OperationClass,
    ) -> BoxFuture<'_, Result<Option<LeaseLock>, InventoryError>>;

    /// Release the lease held by `holder_id`.
    ///
    /// Deletes the row only when it is still held by this holder, so a
    /// late release cannot clobber a lease reclaimed by someone else.
    /// Releasing a lease that is already gone is not an error.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::Storage`]: store access failed
    fn release(
        &self,
        sku_id: &SkuId,
        operation_class: OperationClass,
        holder_id: &HolderId,
    ) -> BoxFuture<'_, Result<(), InventoryError>>;

    /// Delete any row for the key whose expiry has passed.
    ///
    /// Opportunistic cleanup used by acquirers; returns how many rows were
    /// removed (0 or 1).
    ///
    /// # Errors
    ///
    /// - [`InventoryError::Storage`]: store access failed
    fn delete_expired(
        &self,
        sku_id: &SkuId,
        operation_class: OperationClass,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<u64, InventoryError>>;
}
