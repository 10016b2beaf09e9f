//! Error taxonomy for the reservation subsystem.
//!
//! # Design
//!
//! Outcomes are carried in one tagged error type so the façade can
//! pattern-match to decide the lock-fallback path, rather than relying on
//! stack unwinding for control flow:
//!
//! - **Caller bugs**: [`InventoryError::InvalidQuantity`] — rejected before
//!   any store access, never retried.
//! - **Business-rule failures**: [`InventoryError::InsufficientStock`],
//!   [`InventoryError::StockOverflow`] and [`InventoryError::NotFound`] —
//!   real outcomes the caller must handle, recovered nowhere.
//! - **Transient concurrency failures**: [`InventoryError::VersionConflict`]
//!   drives the optimistic retry loop; [`InventoryError::RetriesExhausted`]
//!   escalates from the engine to the façade (never to the original caller);
//!   [`InventoryError::LockTimeout`] is the one transient condition surfaced
//!   to callers, who are expected to retry the whole operation.
//! - **Infrastructure failures**: [`InventoryError::Storage`] — terminal.
//!
//! Version conflicts are a dedicated variant, reported by the store itself.
//! The retry loop matches on the variant and never inspects error text.

use crate::lease::OperationClass;
use crate::sku::{SkuId, Version};
use thiserror::Error;

/// Errors that can occur during reservation operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// Caller supplied a non-positive quantity.
    #[error("Invalid quantity: {qty} (must be a positive integer)")]
    InvalidQuantity {
        /// The quantity as supplied by the caller.
        qty: i64,
    },

    /// No stock record exists for the referenced SKU.
    #[error("Stock record not found for SKU {0}")]
    NotFound(SkuId),

    /// A stock record already exists for the SKU being provisioned.
    ///
    /// Only reachable from SKU creation; records are created once and never
    /// recreated.
    #[error("Stock record already exists for SKU {0}")]
    AlreadyExists(SkuId),

    /// Not enough available (or reserved) units to apply the transition.
    #[error("Insufficient stock for SKU {sku_id}: requested {requested}, available {available}")]
    InsufficientStock {
        /// The SKU the transition targeted.
        sku_id: SkuId,
        /// Units the caller asked for.
        requested: u32,
        /// Units actually available for this transition.
        available: u32,
    },

    /// An increase would push holdings past the representable stock bound.
    ///
    /// Terminal like the other business-rule failures; retrying or locking
    /// cannot make the record hold more units.
    #[error("Stock overflow for SKU {sku_id}: increase of {qty} exceeds capacity at {current}")]
    StockOverflow {
        /// The SKU the increase targeted.
        sku_id: SkuId,
        /// Units the caller tried to add.
        qty: u32,
        /// Units already held when the increase was rejected.
        current: u32,
    },

    /// Optimistic concurrency conflict: the record's version moved between
    /// the read and the conditioned write.
    ///
    /// Internal to the retry protocol. The store guarantees only one writer
    /// observing version V commits to V+1; everyone else gets this.
    #[error("Version conflict on SKU {sku_id}: expected version {expected}")]
    VersionConflict {
        /// The SKU whose record was concurrently modified.
        sku_id: SkuId,
        /// The version the writer observed at read time.
        expected: Version,
    },

    /// The optimistic engine gave up after its bounded retries.
    ///
    /// Internal signal from the engine to the façade; triggers the
    /// leased-lock fallback and is never surfaced to the original caller.
    #[error("Optimistic retries exhausted for SKU {sku_id} after {attempts} attempts")]
    RetriesExhausted {
        /// The contended SKU.
        sku_id: SkuId,
        /// Total attempts made (initial try plus retries).
        attempts: u32,
    },

    /// The leased-lock coordinator could not acquire exclusivity within the
    /// acquisition window.
    ///
    /// Surfaced to the caller as a transient "inventory busy" condition; the
    /// caller should retry the whole operation after a short delay.
    #[error("Timed out acquiring {operation:?} lease for SKU {sku_id}")]
    LockTimeout {
        /// The contended SKU.
        sku_id: SkuId,
        /// The operation class the lease was requested for.
        operation: OperationClass,
    },

    /// Store/database failure unrelated to concurrency.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl InventoryError {
    /// Whether the caller may reasonably retry the whole operation.
    ///
    /// Only lock contention qualifies; business-rule failures and caller
    /// bugs never do.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }

    /// Whether this failure is a business-rule outcome (as opposed to a
    /// concurrency or infrastructure condition).
    ///
    /// Business-rule failures short-circuit the optimistic retry loop and
    /// never trigger the lock fallback, since a lock cannot fix them.
    #[must_use]
    pub const fn is_business_rule(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuantity { .. }
                | Self::NotFound(_)
                | Self::AlreadyExists(_)
                | Self::InsufficientStock { .. }
                | Self::StockOverflow { .. }
        )
    }
}
