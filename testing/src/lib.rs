//! # Holdfast Testing
//!
//! Deterministic test doubles for the Holdfast reservation subsystem.
//!
//! This crate provides:
//! - [`mocks`]: fixed and manually-advanced clocks, sleepers that complete
//!   immediately or drive a manual clock
//! - [`stores`]: in-memory stock and lease stores with the same
//!   compare-and-swap and unique-key semantics as the Postgres
//!   implementations, plus recording/failing projections
//!
//! ## Example
//!
//! ```ignore
//! use holdfast_testing::mocks::{InstantSleeper, test_clock};
//! use holdfast_testing::stores::{InMemoryLeaseStore, InMemoryStockStore};
//!
//! #[tokio::test]
//! async fn reserve_holds_stock() {
//!     let stock = Arc::new(InMemoryStockStore::new());
//!     stock.seed(StockRecord::new(SkuId::new("SKU-1"), 100, 10));
//!
//!     let service = InventoryService::new(
//!         stock,
//!         Arc::new(InMemoryLeaseStore::new()),
//!         Arc::new(RecordingProjection::new()),
//!         Arc::new(test_clock()),
//!         Arc::new(InstantSleeper::default()),
//!     );
//!
//!     let record = service
//!         .reserve_stock(&SkuId::new("SKU-1"), 2, &HolderId::new("order-1"))
//!         .await?;
//!     assert_eq!(record.available_stock(), 98);
//! }
//! ```

pub mod mocks;
pub mod stores;

pub use mocks::{ClockSleeper, FixedClock, InstantSleeper, ManualClock, RecordingSleeper, test_clock};
pub use stores::{
    ConflictInjectingStockStore, FailingProjection, InMemoryLeaseStore, InMemoryStockStore,
    RecordingProjection,
};
