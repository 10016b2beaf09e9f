//! Optimistic reservation engine: version-conditioned writes with bounded
//! retry and linear backoff.
//!
//! Each attempt is a full read-modify-write cycle: read the current record
//! (version V), apply the transition in memory, write back conditioned on
//! "version still equals V". If the condition fails — another writer
//! committed first — the entire attempt is discarded and retried from a
//! fresh read; no partial state is ever merged across attempts.
//!
//! Only [`InventoryError::VersionConflict`] consumes a retry. Business-rule
//! failures (`InsufficientStock`, `InvalidQuantity`, `NotFound`) are real
//! outcomes and short-circuit immediately.
//!
//! # Example
//!
//! ```ignore
//! use holdfast_runtime::optimistic::{OptimisticEngine, RetryPolicy};
//!
//! let engine = OptimisticEngine::new(stock_store, sleeper, RetryPolicy::default());
//! let record = engine.apply(&sku, StockTransition::Reserve(2)).await?;
//! ```

use holdfast_core::environment::Sleeper;
use holdfast_core::error::InventoryError;
use holdfast_core::sku::SkuId;
use holdfast_core::stock::{StockRecord, StockTransition};
use holdfast_core::store::StockStore;
use std::sync::Arc;
use std::time::Duration;

/// Retry policy for the optimistic engine.
///
/// Backoff grows linearly: `backoff_base × attempt_number`, so with the
/// defaults the delays before retries are 100 ms, 200 ms, 300 ms.
///
/// # Default Values
///
/// - `max_retries`: 3
/// - `backoff_base`: 100 ms
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the initial try.
    pub max_retries: u32,
    /// Base unit for the linear backoff.
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_retries: None,
            backoff_base: None,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(attempt)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_retries: Option<u32>,
    backoff_base: Option<Duration>,
}

impl RetryPolicyBuilder {
    /// Set the maximum number of retries.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set the linear backoff base.
    #[must_use]
    pub const fn backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = Some(backoff_base);
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            backoff_base: self.backoff_base.unwrap_or(defaults.backoff_base),
        }
    }
}

/// The optimistic concurrency engine.
///
/// The default path for every reservation operation. When its retries are
/// exhausted under genuinely hot contention it reports
/// [`InventoryError::RetriesExhausted`], and the façade escalates to the
/// leased-lock coordinator.
pub struct OptimisticEngine {
    stock_store: Arc<dyn StockStore>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
}

impl OptimisticEngine {
    /// Create an engine over the given store with the given policy.
    #[must_use]
    pub fn new(
        stock_store: Arc<dyn StockStore>,
        sleeper: Arc<dyn Sleeper>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            stock_store,
            sleeper,
            policy,
        }
    }

    /// Apply one transition to the SKU's stock record, retrying version
    /// conflicts up to the policy bound.
    ///
    /// Returns the committed record on success.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::NotFound`]: no stock record exists for `sku_id`
    /// - [`InventoryError::InvalidQuantity`] /
    ///   [`InventoryError::InsufficientStock`]: business-rule failure,
    ///   surfaced immediately without consuming a retry
    /// - [`InventoryError::RetriesExhausted`]: every attempt lost the
    ///   version race; the caller should fall back to the lock path
    /// - [`InventoryError::Storage`]: store access failed
    pub async fn apply(
        &self,
        sku_id: &SkuId,
        transition: StockTransition,
    ) -> Result<StockRecord, InventoryError> {
        let mut attempt: u32 = 0;

        loop {
            match self.try_once(sku_id, transition).await {
                Ok(record) => {
                    if attempt > 0 {
                        tracing::info!(
                            sku = %sku_id,
                            attempt,
                            "optimistic commit succeeded after retry"
                        );
                    }
                    return Ok(record);
                },
                Err(InventoryError::VersionConflict { expected, .. }) => {
                    metrics::counter!("holdfast_version_conflicts_total").increment(1);

                    if attempt >= self.policy.max_retries {
                        tracing::error!(
                            sku = %sku_id,
                            attempts = attempt + 1,
                            "optimistic retries exhausted"
                        );
                        return Err(InventoryError::RetriesExhausted {
                            sku_id: sku_id.clone(),
                            attempts: attempt + 1,
                        });
                    }

                    attempt += 1;
                    let delay = self.policy.delay_for_attempt(attempt);
                    tracing::warn!(
                        sku = %sku_id,
                        attempt,
                        expected_version = %expected,
                        delay_ms = delay.as_millis(),
                        "version conflict, retrying from a fresh read"
                    );
                    self.sleeper.sleep(delay).await;
                },
                // Business-rule and infrastructure failures are not retried.
                Err(err) => return Err(err),
            }
        }
    }

    /// One full read-modify-write attempt.
    async fn try_once(
        &self,
        sku_id: &SkuId,
        transition: StockTransition,
    ) -> Result<StockRecord, InventoryError> {
        let Some(mut record) = self.stock_store.get(sku_id).await? else {
            return Err(InventoryError::NotFound(sku_id.clone()));
        };

        let observed = record.version;
        record.apply(transition)?;

        let committed = self
            .stock_store
            .update_if_version(&record, observed)
            .await?;

        tracing::debug!(
            sku = %sku_id,
            ?transition,
            version = %committed.version,
            "stock transition committed"
        );
        Ok(committed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use holdfast_testing::mocks::InstantSleeper;
    use holdfast_testing::stores::{ConflictInjectingStockStore, InMemoryStockStore};

    fn seeded_store(initial: u32) -> (Arc<InMemoryStockStore>, SkuId) {
        let sku = SkuId::new("SKU-ENGINE");
        let store = Arc::new(InMemoryStockStore::new());
        store.seed(StockRecord::new(sku.clone(), initial, 5));
        (store, sku)
    }

    fn engine(store: Arc<dyn StockStore>) -> OptimisticEngine {
        OptimisticEngine::new(store, Arc::new(InstantSleeper::default()), RetryPolicy::default())
    }

    #[test]
    fn linear_backoff_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(300));
    }

    #[test]
    fn builder_overrides_defaults() {
        let policy = RetryPolicy::builder()
            .max_retries(5)
            .backoff_base(Duration::from_millis(10))
            .build();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(20));
    }

    #[tokio::test]
    async fn commit_bumps_version_by_one() {
        let (store, sku) = seeded_store(100);
        let engine = engine(store.clone());

        let committed = engine.apply(&sku, StockTransition::Reserve(10)).await.unwrap();
        assert_eq!(committed.reserved_stock, 10);
        assert_eq!(committed.version.value(), 1);

        let committed = engine.apply(&sku, StockTransition::Reserve(5)).await.unwrap();
        assert_eq!(committed.version.value(), 2);
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let store = Arc::new(InMemoryStockStore::new());
        let engine = engine(store);
        let err = engine
            .apply(&SkuId::new("SKU-MISSING"), StockTransition::Reserve(1))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn conflicts_are_retried_then_succeed() {
        let (inner, sku) = seeded_store(100);
        let store = Arc::new(ConflictInjectingStockStore::new(inner, 2));
        let engine = engine(store.clone());

        let committed = engine.apply(&sku, StockTransition::Reserve(1)).await.unwrap();
        assert_eq!(committed.reserved_stock, 1);
        // Two conflicted attempts plus the committing one.
        assert_eq!(store.update_attempts(), 3);
    }

    #[tokio::test]
    async fn exhaustion_after_bounded_retries() {
        let (inner, sku) = seeded_store(100);
        // More conflicts than the engine will ever attempt.
        let store = Arc::new(ConflictInjectingStockStore::new(inner, u32::MAX));
        let engine = engine(store.clone());

        let err = engine.apply(&sku, StockTransition::Reserve(1)).await.unwrap_err();
        assert!(matches!(
            err,
            InventoryError::RetriesExhausted { attempts: 4, .. }
        ));
        // Initial try + 3 retries, each reaching the conditioned write.
        assert_eq!(store.update_attempts(), 4);
    }

    #[tokio::test]
    async fn business_failure_consumes_no_retry() {
        let (inner, sku) = seeded_store(50);
        let store = Arc::new(ConflictInjectingStockStore::new(inner, u32::MAX));
        let engine = engine(store.clone());

        let err = engine.apply(&sku, StockTransition::Reserve(100)).await.unwrap_err();
        assert!(matches!(err, InventoryError::InsufficientStock { .. }));
        // The transition failed in memory; the conditioned write never ran.
        assert_eq!(store.update_attempts(), 0);
    }
}
