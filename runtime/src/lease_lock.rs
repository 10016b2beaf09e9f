//! Leased-lock coordinator: the pessimistic fallback path.
//!
//! Used only when the optimistic engine reports `RetriesExhausted`,
//! representing genuinely hot contention where livelock is likely. The
//! coordinator acquires an exclusive lease row for (`sku_id`,
//! `operation_class`), performs one stock transition while holding it, and
//! releases the lease in all outcomes. A lease orphaned by a crash simply
//! expires at its TTL and is reclaimed by the next acquirer — that expiry is
//! the deadlock-avoidance mechanism.
//!
//! Acquisition protocol:
//!
//! 1. opportunistically delete any expired row for the key (best-effort;
//!    failure is non-fatal);
//! 2. attempt to insert a fresh lease with `expiry = now + lease_ttl`;
//!    success means acquired;
//! 3. on duplicate key, read the holder's row; if it has expired, delete it
//!    and retry the insert immediately, otherwise sleep a short poll
//!    interval and go to 2;
//! 4. the whole acquisition is bounded by `acquire_timeout`, after which the
//!    caller gets `LockTimeout`.

use holdfast_core::environment::{Clock, Sleeper};
use holdfast_core::error::InventoryError;
use holdfast_core::lease::{LeaseLock, OperationClass};
use holdfast_core::sku::{HolderId, SkuId};
use holdfast_core::stock::{StockRecord, StockTransition};
use holdfast_core::store::{LeaseStore, StockStore};
use std::sync::Arc;
use std::time::Duration;

/// Timing configuration for the coordinator.
///
/// # Default Values
///
/// - `lease_ttl`: 5 minutes
/// - `poll_interval`: 50 ms
/// - `acquire_timeout`: 10 seconds
#[derive(Debug, Clone)]
pub struct LeasePolicy {
    /// How long an acquired lease lives before it self-expires.
    pub lease_ttl: Duration,
    /// Sleep between acquisition attempts while the lease is held elsewhere.
    pub poll_interval: Duration,
    /// Wall-clock bound on the whole acquisition.
    pub acquire_timeout: Duration,
}

impl Default for LeasePolicy {
    fn default() -> Self {
        Self {
            lease_ttl: Duration::from_secs(5 * 60),
            poll_interval: Duration::from_millis(50),
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

impl LeasePolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> LeasePolicyBuilder {
        LeasePolicyBuilder {
            lease_ttl: None,
            poll_interval: None,
            acquire_timeout: None,
        }
    }
}

/// Builder for [`LeasePolicy`].
#[derive(Debug, Clone)]
pub struct LeasePolicyBuilder {
    lease_ttl: Option<Duration>,
    poll_interval: Option<Duration>,
    acquire_timeout: Option<Duration>,
}

impl LeasePolicyBuilder {
    /// Set the lease TTL.
    #[must_use]
    pub const fn lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = Some(ttl);
        self
    }

    /// Set the poll interval between acquisition attempts.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Set the acquisition timeout.
    #[must_use]
    pub const fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Build the [`LeasePolicy`].
    #[must_use]
    pub fn build(self) -> LeasePolicy {
        let defaults = LeasePolicy::default();
        LeasePolicy {
            lease_ttl: self.lease_ttl.unwrap_or(defaults.lease_ttl),
            poll_interval: self.poll_interval.unwrap_or(defaults.poll_interval),
            acquire_timeout: self.acquire_timeout.unwrap_or(defaults.acquire_timeout),
        }
    }
}

/// The leased-lock coordinator.
pub struct LeaseCoordinator {
    stock_store: Arc<dyn StockStore>,
    lease_store: Arc<dyn LeaseStore>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    policy: LeasePolicy,
}

impl LeaseCoordinator {
    /// Create a coordinator over the given stores.
    #[must_use]
    pub fn new(
        stock_store: Arc<dyn StockStore>,
        lease_store: Arc<dyn LeaseStore>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
        policy: LeasePolicy,
    ) -> Self {
        Self {
            stock_store,
            lease_store,
            clock,
            sleeper,
            policy,
        }
    }

    /// Apply one transition under an exclusive lease.
    ///
    /// The lease is released in all outcomes; if even the release fails, the
    /// lease expires on its own at the TTL.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::LockTimeout`]: exclusivity could not be acquired
    ///   within the acquisition window
    /// - any error from the underlying transition (`NotFound`,
    ///   `InvalidQuantity`, `InsufficientStock`, `Storage`)
    pub async fn apply_locked(
        &self,
        sku_id: &SkuId,
        transition: StockTransition,
        holder_id: &HolderId,
    ) -> Result<StockRecord, InventoryError> {
        let operation_class = transition.operation_class();
        self.acquire(sku_id, operation_class, holder_id).await?;

        let result = self.apply_held(sku_id, transition).await;

        // Guaranteed release regardless of the transition outcome.
        if let Err(err) = self
            .lease_store
            .release(sku_id, operation_class, holder_id)
            .await
        {
            tracing::warn!(
                sku = %sku_id,
                class = %operation_class,
                holder = %holder_id,
                error = %err,
                "lease release failed; lease will self-expire at its TTL"
            );
        }

        result
    }

    /// Acquire the lease for (`sku_id`, `operation_class`).
    async fn acquire(
        &self,
        sku_id: &SkuId,
        operation_class: OperationClass,
        holder_id: &HolderId,
    ) -> Result<(), InventoryError> {
        let started = self.clock.now();

        // Opportunistic cleanup of an expired lease left by a dead holder.
        if let Err(err) = self
            .lease_store
            .delete_expired(sku_id, operation_class, started)
            .await
        {
            tracing::warn!(
                sku = %sku_id,
                class = %operation_class,
                error = %err,
                "expired-lease cleanup failed, continuing acquisition"
            );
        }

        loop {
            let now = self.clock.now();
            if now - started
                >= chrono::Duration::from_std(self.policy.acquire_timeout)
                    .unwrap_or(chrono::Duration::MAX)
            {
                metrics::counter!("holdfast_lock_timeouts_total").increment(1);
                tracing::error!(
                    sku = %sku_id,
                    class = %operation_class,
                    holder = %holder_id,
                    "lease acquisition timed out"
                );
                return Err(InventoryError::LockTimeout {
                    sku_id: sku_id.clone(),
                    operation: operation_class,
                });
            }

            let lease = LeaseLock::new(
                sku_id.clone(),
                operation_class,
                holder_id.clone(),
                now + chrono::Duration::from_std(self.policy.lease_ttl)
                    .unwrap_or(chrono::Duration::MAX),
            );

            if self.lease_store.try_acquire(lease).await? {
                tracing::debug!(
                    sku = %sku_id,
                    class = %operation_class,
                    holder = %holder_id,
                    "lease acquired"
                );
                return Ok(());
            }

            // Someone holds the row. An expired lease is reclaimed and the
            // insert retried immediately; an unexpired row (held, or
            // soft-released mid-release) waits out a poll interval.
            if let Some(existing) = self.lease_store.find(sku_id, operation_class).await? {
                if existing.is_expired(now) {
                    tracing::warn!(
                        sku = %sku_id,
                        class = %operation_class,
                        stale_holder = %existing.holder_id,
                        "reclaiming expired lease"
                    );
                    let removed = self
                        .lease_store
                        .delete_expired(sku_id, operation_class, now)
                        .await?;
                    // Zero rows means a competing acquirer reclaimed and
                    // re-acquired between the read and the delete.
                    if removed > 0 {
                        continue;
                    }
                }
            }

            self.sleeper.sleep(self.policy.poll_interval).await;
        }
    }

    /// One transition while the lease is held.
    ///
    /// Leases are scoped per operation class, so optimistic writers of other
    /// classes may still interleave; a version conflict here is re-read
    /// immediately (the lease bounds same-class contention, no backoff
    /// escalation is needed). The versioned write keeps the +1-per-commit
    /// guarantee on this path too.
    async fn apply_held(
        &self,
        sku_id: &SkuId,
        transition: StockTransition,
    ) -> Result<StockRecord, InventoryError> {
        loop {
            let Some(mut record) = self.stock_store.get(sku_id).await? else {
                return Err(InventoryError::NotFound(sku_id.clone()));
            };

            let observed = record.version;
            record.apply(transition)?;

            match self.stock_store.update_if_version(&record, observed).await {
                Ok(committed) => {
                    tracing::debug!(
                        sku = %sku_id,
                        ?transition,
                        version = %committed.version,
                        "stock transition committed under lease"
                    );
                    return Ok(committed);
                },
                Err(InventoryError::VersionConflict { .. }) => {
                    self.sleeper.sleep(self.policy.poll_interval).await;
                },
                Err(err) => return Err(err),
            }
        }
    }
}
