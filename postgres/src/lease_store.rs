//! `PostgreSQL`-backed lease lock store.
//!
//! The `(sku_id, operation_class)` primary key does the locking: acquisition
//! is `INSERT ... ON CONFLICT DO NOTHING`, so any number of racing acquirers
//! produce exactly one row and everybody else learns the lock is held from
//! `rows_affected() == 0`. No advisory locks, no SELECT FOR UPDATE.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use holdfast_core::error::InventoryError;
use holdfast_core::lease::{LeaseLock, OperationClass};
use holdfast_core::sku::{HolderId, SkuId};
use holdfast_core::store::LeaseStore;
use sqlx::PgPool;

/// Parse an operation class from its database string representation.
fn parse_operation_class(s: &str) -> Result<OperationClass, InventoryError> {
    match s {
        "RESERVE" => Ok(OperationClass::Reserve),
        "DEDUCT" => Ok(OperationClass::Deduct),
        "RESTOCK" => Ok(OperationClass::Restock),
        "CHECK" => Ok(OperationClass::Check),
        _ => Err(InventoryError::Storage(format!(
            "Invalid operation class: {s}"
        ))),
    }
}

#[derive(sqlx::FromRow)]
struct LeaseRow {
    sku_id: String,
    operation_class: String,
    holder_id: String,
    expiry_time: DateTime<Utc>,
    is_active: bool,
}

impl LeaseRow {
    fn into_lease(self) -> Result<LeaseLock, InventoryError> {
        Ok(LeaseLock {
            sku_id: SkuId::new(self.sku_id),
            operation_class: parse_operation_class(&self.operation_class)?,
            holder_id: HolderId::new(self.holder_id),
            expiry_time: self.expiry_time,
            is_active: self.is_active,
        })
    }
}

/// `PostgreSQL` implementation of [`LeaseStore`].
#[derive(Clone)]
pub struct PostgresLeaseStore {
    pool: PgPool,
}

impl PostgresLeaseStore {
    /// Create a store using an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl LeaseStore for PostgresLeaseStore {
    fn try_acquire(&self, lease: LeaseLock) -> BoxFuture<'_, Result<bool, InventoryError>> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                INSERT INTO lease_locks (
                    sku_id, operation_class, holder_id, expiry_time, is_active
                ) VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (sku_id, operation_class) DO NOTHING
                ",
            )
            .bind(lease.sku_id.as_str())
            .bind(lease.operation_class.as_str())
            .bind(lease.holder_id.as_str())
            .bind(lease.expiry_time)
            .bind(lease.is_active)
            .execute(&self.pool)
            .await
            .map_err(|e| InventoryError::Storage(format!("Failed to acquire lease: {e}")))?;

            Ok(result.rows_affected() == 1)
        })
    }

    fn find(
        &self,
        sku_id: &SkuId,
        operation_class: OperationClass,
    ) -> BoxFuture<'_, Result<Option<LeaseLock>, InventoryError>> {
        let sku_id = sku_id.clone();
        Box::pin(async move {
            let row: Option<LeaseRow> = sqlx::query_as(
                r"
                SELECT sku_id, operation_class, holder_id, expiry_time, is_active
                FROM lease_locks
                WHERE sku_id = $1 AND operation_class = $2
                ",
            )
            .bind(sku_id.as_str())
            .bind(operation_class.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| InventoryError::Storage(format!("Failed to read lease: {e}")))?;

            row.map(LeaseRow::into_lease).transpose()
        })
    }

    fn release(
        &self,
        sku_id: &SkuId,
        operation_class: OperationClass,
        holder_id: &HolderId,
    ) -> BoxFuture<'_, Result<(), InventoryError>> {
        let sku_id = sku_id.clone();
        let holder_id = holder_id.clone();
        Box::pin(async move {
            // Holder-guarded: a late release never deletes a lease that was
            // reclaimed and re-acquired by somebody else.
            sqlx::query(
                r"
                DELETE FROM lease_locks
                WHERE sku_id = $1 AND operation_class = $2 AND holder_id = $3
                ",
            )
            .bind(sku_id.as_str())
            .bind(operation_class.as_str())
            .bind(holder_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| InventoryError::Storage(format!("Failed to release lease: {e}")))?;

            Ok(())
        })
    }

    fn delete_expired(
        &self,
        sku_id: &SkuId,
        operation_class: OperationClass,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<u64, InventoryError>> {
        let sku_id = sku_id.clone();
        Box::pin(async move {
            let result = sqlx::query(
                r"
                DELETE FROM lease_locks
                WHERE sku_id = $1 AND operation_class = $2 AND expiry_time < $3
                ",
            )
            .bind(sku_id.as_str())
            .bind(operation_class.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| InventoryError::Storage(format!("Failed to delete expired lease: {e}")))?;

            let deleted = result.rows_affected();
            if deleted > 0 {
                tracing::debug!(
                    sku = %sku_id,
                    operation = %operation_class,
                    "reclaimed expired lease"
                );
            }
            Ok(deleted)
        })
    }
}
