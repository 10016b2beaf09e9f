//! `PostgreSQL`-backed read-side stock mirror.

use futures::future::BoxFuture;
use holdfast_core::projection::{ProjectionError, Result, StockProjection, StockSnapshot};
use sqlx::PgPool;

/// `PostgreSQL` implementation of [`StockProjection`].
///
/// Upserts one denormalized row per SKU into `stock_mirror`. Mirror tasks
/// are detached and may land out of order, so the upsert carries a version
/// guard: a snapshot older than the stored row is silently dropped and the
/// mirror never moves backwards.
#[derive(Clone)]
pub struct PostgresStockProjection {
    pool: PgPool,
}

impl PostgresStockProjection {
    /// Create a projection using an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl StockProjection for PostgresStockProjection {
    fn mirror(&self, snapshot: StockSnapshot) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let version = i64::try_from(snapshot.version.value()).map_err(|_| {
                ProjectionError::Serialization(format!(
                    "Version out of range: {}",
                    snapshot.version
                ))
            })?;

            sqlx::query(
                r"
                INSERT INTO stock_mirror (
                    sku_id, current_stock, reserved_stock, available_stock,
                    version, mirrored_at
                ) VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (sku_id) DO UPDATE
                SET current_stock = EXCLUDED.current_stock,
                    reserved_stock = EXCLUDED.reserved_stock,
                    available_stock = EXCLUDED.available_stock,
                    version = EXCLUDED.version,
                    mirrored_at = EXCLUDED.mirrored_at
                WHERE stock_mirror.version < EXCLUDED.version
                ",
            )
            .bind(snapshot.sku_id.as_str())
            .bind(i64::from(snapshot.current_stock))
            .bind(i64::from(snapshot.reserved_stock))
            .bind(i64::from(snapshot.available_stock))
            .bind(version)
            .bind(snapshot.mirrored_at)
            .execute(&self.pool)
            .await
            .map_err(|e| ProjectionError::Storage(format!("Failed to mirror stock: {e}")))?;

            Ok(())
        })
    }
}
