//! Read-side stock projection for product listings.
//!
//! # Overview
//!
//! Product-listing pages are read-heavy and should not touch the versioned
//! stock record. Instead, after every successful commit the façade mirrors
//! the new counts onto a denormalized projection consumed by those reads.
//!
//! The mirror write is **best-effort and fire-and-forget**: it is dispatched
//! as a detached task after the commit, its failure is logged and counted but
//! never surfaced, and inventory correctness never depends on the projection
//! being fresh. The projection is eventually consistent, not transactional.

use crate::sku::{SkuId, Version};
use crate::stock::StockRecord;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for projection operations.
///
/// Deliberately separate from `InventoryError`: mirror failures must be
/// observable only via logs and metrics, never via a caller's result type.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// Storage backend error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;

/// Denormalized snapshot of one SKU's stock counts.
///
/// Exactly the fields listing reads care about; everything else on the
/// record (audit counters, thresholds) stays on the write side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    /// The SKU this snapshot describes.
    pub sku_id: SkuId,
    /// Total units owned at the mirrored commit.
    pub current_stock: u32,
    /// Units reserved at the mirrored commit.
    pub reserved_stock: u32,
    /// Units available for sale at the mirrored commit.
    pub available_stock: u32,
    /// The commit this snapshot mirrors.
    pub version: Version,
    /// When the snapshot was taken.
    pub mirrored_at: DateTime<Utc>,
}

impl StockSnapshot {
    /// Capture a snapshot of a freshly committed record.
    #[must_use]
    pub fn of(record: &StockRecord, mirrored_at: DateTime<Utc>) -> Self {
        Self {
            sku_id: record.sku_id.clone(),
            current_stock: record.current_stock,
            reserved_stock: record.reserved_stock,
            available_stock: record.available_stock(),
            version: record.version,
            mirrored_at,
        }
    }
}

/// Sink for best-effort mirror writes.
///
/// # Implementations
///
/// - `PostgresStockProjection` (in `holdfast-postgres`): upserts into the
///   listing table
/// - `RecordingProjection` / `FailingProjection` (in `holdfast-testing`)
pub trait StockProjection: Send + Sync {
    /// Mirror a committed snapshot onto the read-side store.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError`] on storage failure; the caller logs and
    /// drops it.
    fn mirror(&self, snapshot: StockSnapshot) -> BoxFuture<'_, Result<()>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_captures_derived_availability() {
        let mut record = StockRecord::new(SkuId::new("SKU-1"), 20, 5);
        record.reserved_stock = 6;
        let at = Utc::now();
        let snap = StockSnapshot::of(&record, at);
        assert_eq!(snap.current_stock, 20);
        assert_eq!(snap.reserved_stock, 6);
        assert_eq!(snap.available_stock, 14);
        assert_eq!(snap.mirrored_at, at);
    }
}
