//! `PostgreSQL` persistence for the Holdfast reservation subsystem.
//!
//! This crate provides production implementations of the storage traits in
//! `holdfast-core`:
//!
//! - [`PostgresStockStore`]: versioned stock records with conditional
//!   (`WHERE version = $expected`) writes
//! - [`PostgresLeaseStore`]: leased locks backed by a unique
//!   (`sku_id`, `operation_class`) key
//! - [`PostgresStockProjection`]: denormalized read-side mirror with a
//!   monotonic version guard
//!
//! All three can share one connection pool.
//!
//! # Example
//!
//! ```ignore
//! use holdfast_postgres::{PostgresLeaseStore, PostgresStockStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = holdfast_postgres::connect("postgres://localhost/holdfast").await?;
//!     holdfast_postgres::migrate(&pool).await?;
//!
//!     let stock_store = PostgresStockStore::new(pool.clone());
//!     let lease_store = PostgresLeaseStore::new(pool);
//!     Ok(())
//! }
//! ```

pub mod lease_store;
pub mod mirror;
pub mod stock_store;

pub use lease_store::PostgresLeaseStore;
pub use mirror::PostgresStockProjection;
pub use stock_store::PostgresStockStore;

use holdfast_core::error::InventoryError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Open a connection pool against `database_url`.
///
/// # Errors
///
/// Returns [`InventoryError::Storage`] if the connection fails.
pub async fn connect(database_url: &str) -> Result<PgPool, InventoryError> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|e| InventoryError::Storage(format!("Failed to connect: {e}")))
}

/// Run database migrations for the stock, lease, and mirror tables.
///
/// # Errors
///
/// Returns [`InventoryError::Storage`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), InventoryError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| InventoryError::Storage(format!("Migration failed: {e}")))?;
    Ok(())
}
