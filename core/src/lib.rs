//! # Holdfast Core
//!
//! Domain types and trait seams for the Holdfast inventory reservation
//! subsystem.
//!
//! Holdfast tracks per-SKU stock, reserves units against in-flight orders,
//! confirms or releases those reservations, and stays correct when many
//! requests race on the same stock record. This crate holds the pure domain
//! layer; `holdfast-runtime` orchestrates it and `holdfast-postgres`
//! persists it.
//!
//! ## Core Concepts
//!
//! - **[`stock::StockRecord`]**: per-SKU numeric state machine
//!   (`current_stock` / `reserved_stock`) with monotone audit counters and a
//!   version number for optimistic concurrency
//! - **[`stock::StockTransition`]**: the transitions callers may apply
//! - **[`lease::LeaseLock`]**: per-(SKU, operation-class) exclusive lease
//!   with TTL expiry, the fallback coordination primitive
//! - **[`store::StockStore`] / [`store::LeaseStore`]**: the persistence
//!   boundary — versioned conditional writes and duplicate-key inserts
//! - **[`projection::StockProjection`]**: best-effort denormalized mirror
//!   for read-heavy listings
//! - **[`environment::Clock`] / [`environment::Sleeper`]**: injected time,
//!   so every retry and poll is deterministic under test
//!
//! ## Example
//!
//! ```
//! use holdfast_core::sku::SkuId;
//! use holdfast_core::stock::{StockRecord, StockTransition};
//!
//! let mut record = StockRecord::new(SkuId::new("SKU-1001"), 100, 10);
//! record.apply(StockTransition::Reserve(10)).unwrap();
//! assert_eq!(record.available_stock(), 90);
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod environment;
pub mod error;
pub mod lease;
pub mod projection;
pub mod sku;
pub mod stock;
pub mod store;

pub use error::InventoryError;
pub use lease::{LeaseLock, OperationClass};
pub use sku::{HolderId, SkuId, Version};
pub use stock::{StockRecord, StockTransition};
