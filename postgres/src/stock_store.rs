//! `PostgreSQL`-backed stock record store.
//!
//! The version column is the whole concurrency story: every mutation is an
//! `UPDATE ... WHERE sku_id = $1 AND version = $expected` that bumps the
//! version by one in the same statement, so "somebody committed before me"
//! shows up as zero rows updated and nothing else.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use holdfast_core::error::InventoryError;
use holdfast_core::sku::{SkuId, Version};
use holdfast_core::stock::StockRecord;
use holdfast_core::store::StockStore;
use sqlx::PgPool;

const STOCK_COLUMNS: &str = "sku_id, current_stock, reserved_stock, inbound_total, \
     outbound_total, damage_count, warning_threshold, version, last_check_time";

/// Row shape shared by every query that returns a stock record.
#[derive(sqlx::FromRow)]
struct StockRow {
    sku_id: String,
    current_stock: i64,
    reserved_stock: i64,
    inbound_total: i64,
    outbound_total: i64,
    damage_count: i64,
    warning_threshold: i64,
    version: i64,
    last_check_time: Option<DateTime<Utc>>,
}

impl StockRow {
    fn into_record(self) -> Result<StockRecord, InventoryError> {
        Ok(StockRecord {
            sku_id: SkuId::new(self.sku_id),
            current_stock: column_u32(self.current_stock, "current_stock")?,
            reserved_stock: column_u32(self.reserved_stock, "reserved_stock")?,
            inbound_total: column_u64(self.inbound_total, "inbound_total")?,
            outbound_total: column_u64(self.outbound_total, "outbound_total")?,
            damage_count: column_u64(self.damage_count, "damage_count")?,
            warning_threshold: column_u32(self.warning_threshold, "warning_threshold")?,
            version: Version::new(column_u64(self.version, "version")?),
            last_check_time: self.last_check_time,
        })
    }
}

fn column_u32(value: i64, column: &str) -> Result<u32, InventoryError> {
    u32::try_from(value)
        .map_err(|_| InventoryError::Storage(format!("Column {column} out of range: {value}")))
}

fn column_u64(value: i64, column: &str) -> Result<u64, InventoryError> {
    u64::try_from(value)
        .map_err(|_| InventoryError::Storage(format!("Column {column} out of range: {value}")))
}

fn bind_u64(value: u64, column: &str) -> Result<i64, InventoryError> {
    i64::try_from(value)
        .map_err(|_| InventoryError::Storage(format!("Column {column} out of range: {value}")))
}

/// `PostgreSQL` implementation of [`StockStore`].
///
/// # Example
///
/// ```ignore
/// use holdfast_postgres::PostgresStockStore;
///
/// let pool = holdfast_postgres::connect("postgres://localhost/holdfast").await?;
/// holdfast_postgres::migrate(&pool).await?;
/// let store = PostgresStockStore::new(pool);
/// ```
#[derive(Clone)]
pub struct PostgresStockStore {
    pool: PgPool,
}

impl PostgresStockStore {
    /// Create a store using an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl StockStore for PostgresStockStore {
    fn get(&self, sku_id: &SkuId) -> BoxFuture<'_, Result<Option<StockRecord>, InventoryError>> {
        let sku_id = sku_id.clone();
        Box::pin(async move {
            let query = format!("SELECT {STOCK_COLUMNS} FROM stock_records WHERE sku_id = $1");
            let row: Option<StockRow> = sqlx::query_as(&query)
                .bind(sku_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| InventoryError::Storage(format!("Failed to read stock: {e}")))?;

            row.map(StockRow::into_record).transpose()
        })
    }

    fn insert(&self, record: StockRecord) -> BoxFuture<'_, Result<(), InventoryError>> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                INSERT INTO stock_records (
                    sku_id, current_stock, reserved_stock, inbound_total,
                    outbound_total, damage_count, warning_threshold, version,
                    last_check_time
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ",
            )
            .bind(record.sku_id.as_str())
            .bind(i64::from(record.current_stock))
            .bind(i64::from(record.reserved_stock))
            .bind(bind_u64(record.inbound_total, "inbound_total")?)
            .bind(bind_u64(record.outbound_total, "outbound_total")?)
            .bind(bind_u64(record.damage_count, "damage_count")?)
            .bind(i64::from(record.warning_threshold))
            .bind(bind_u64(record.version.value(), "version")?)
            .bind(record.last_check_time)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => Ok(()),
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    Err(InventoryError::AlreadyExists(record.sku_id))
                },
                Err(e) => Err(InventoryError::Storage(format!(
                    "Failed to insert stock: {e}"
                ))),
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
            let query = format!(
                r"
                UPDATE stock_records
                SET current_stock = $3,
                    reserved_stock = $4,
                    inbound_total = $5,
                    outbound_total = $6,
                    damage_count = $7,
                    warning_threshold = $8,
                    last_check_time = $9,
                    version = version + 1,
                    updated_at = now()
                WHERE sku_id = $1 AND version = $2
                RETURNING {STOCK_COLUMNS}
                "
            );
            let committed: Option<StockRow> = sqlx::query_as(&query)
                .bind(record.sku_id.as_str())
                .bind(bind_u64(expected.value(), "version")?)
                .bind(i64::from(record.current_stock))
                .bind(i64::from(record.reserved_stock))
                .bind(bind_u64(record.inbound_total, "inbound_total")?)
                .bind(bind_u64(record.outbound_total, "outbound_total")?)
                .bind(bind_u64(record.damage_count, "damage_count")?)
                .bind(i64::from(record.warning_threshold))
                .bind(record.last_check_time)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| InventoryError::Storage(format!("Failed to update stock: {e}")))?;

            if let Some(row) = committed {
                return row.into_record();
            }

            // Zero rows: either the record is gone or somebody else
            // committed first. Disambiguate with a plain existence check.
            let (exists,): (bool,) =
                sqlx::query_as("SELECT EXISTS(SELECT 1 FROM stock_records WHERE sku_id = $1)")
                    .bind(record.sku_id.as_str())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| {
                        InventoryError::Storage(format!("Failed to check stock exists: {e}"))
                    })?;

            if exists {
                Err(InventoryError::VersionConflict {
                    sku_id: record.sku_id,
                    expected,
                })
            } else {
                Err(InventoryError::NotFound(record.sku_id))
            }
        })
    }
}
