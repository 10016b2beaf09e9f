//! Per-SKU stock record and its transition state machine.
//!
//! The "state" here is not a named enum but a pair of non-negative integers
//! (`current_stock`, `reserved_stock`) constrained by the invariant
//! `reserved_stock <= current_stock`. Four kinds of transition mutate the
//! pair; each is validated in full before any field changes, so a failed
//! transition leaves the record untouched.
//!
//! Versioning is deliberately **not** done here: [`StockRecord::apply`]
//! mutates an in-memory copy, and the store bumps `version` by exactly 1
//! when the conditioned write commits. Keeping the bump at the commit point
//! is what makes the optimistic protocol's conflict check meaningful.

use crate::error::InventoryError;
use crate::lease::OperationClass;
use crate::sku::{SkuId, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single state transition against a [`StockRecord`].
///
/// Quantities are validated by [`StockRecord::apply`]; a zero quantity is
/// rejected with [`InventoryError::InvalidQuantity`] before any mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockTransition {
    /// Hold `qty` units against an unconfirmed order.
    Reserve(u32),
    /// Release up to `qty` previously reserved units back to the pool.
    CancelReserve(u32),
    /// Turn `qty` reserved units into an outbound shipment.
    ConfirmReserve(u32),
    /// Add `qty` units of new stock (restock / inbound delivery).
    Increase(u32),
    /// Remove `qty` unreserved units (manual adjustment / outbound).
    Decrease(u32),
    /// Write off `qty` unreserved units as damaged.
    RecordDamage(u32),
    /// Record a stock-take at the given instant; counts are unchanged.
    Check {
        /// When the stock-take happened.
        at: DateTime<Utc>,
    },
}

impl StockTransition {
    /// The lease operation class under which this transition runs on the
    /// pessimistic fallback path.
    #[must_use]
    pub const fn operation_class(self) -> OperationClass {
        match self {
            Self::Reserve(_) | Self::CancelReserve(_) => OperationClass::Reserve,
            Self::ConfirmReserve(_) | Self::Decrease(_) | Self::RecordDamage(_) => {
                OperationClass::Deduct
            },
            Self::Increase(_) => OperationClass::Restock,
            Self::Check { .. } => OperationClass::Check,
        }
    }

    /// The quantity this transition carries, if any.
    #[must_use]
    pub const fn quantity(self) -> Option<u32> {
        match self {
            Self::Reserve(qty)
            | Self::CancelReserve(qty)
            | Self::ConfirmReserve(qty)
            | Self::Increase(qty)
            | Self::Decrease(qty)
            | Self::RecordDamage(qty) => Some(qty),
            Self::Check { .. } => None,
        }
    }
}

/// Persisted per-SKU stock record.
///
/// One record exists per SKU, created at SKU provisioning time and never
/// physically deleted (retained for audit even if the SKU is retired). All
/// mutations go through [`StockRecord::apply`].
///
/// # Invariants (checked at every commit)
///
/// - `reserved_stock <= current_stock`
/// - `available_stock() == current_stock - reserved_stock`, never negative
/// - `inbound_total`, `outbound_total`, `damage_count` only ever grow, and
///   only inside the same conditioned commit as the primary state change
/// - `version` increases by exactly 1 per successful commit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    /// The SKU this record tracks.
    pub sku_id: SkuId,
    /// Total units physically/logically owned.
    pub current_stock: u32,
    /// Units held against unconfirmed orders.
    pub reserved_stock: u32,
    /// Cumulative units ever received.
    pub inbound_total: u64,
    /// Cumulative units ever shipped or adjusted out.
    pub outbound_total: u64,
    /// Cumulative units written off as damaged.
    pub damage_count: u64,
    /// At or below this level the record reports low stock.
    pub warning_threshold: u32,
    /// Optimistic concurrency version, bumped by the store on commit.
    pub version: Version,
    /// When the last stock-take happened, if ever.
    pub last_check_time: Option<DateTime<Utc>>,
}

impl StockRecord {
    /// Create a fresh record for a newly provisioned SKU.
    ///
    /// The initial units count toward `inbound_total` so the audit counters
    /// reconcile against `current_stock` from day one.
    #[must_use]
    pub fn new(sku_id: SkuId, initial_stock: u32, warning_threshold: u32) -> Self {
        Self {
            sku_id,
            current_stock: initial_stock,
            reserved_stock: 0,
            inbound_total: u64::from(initial_stock),
            outbound_total: 0,
            damage_count: 0,
            warning_threshold,
            version: Version::INITIAL,
            last_check_time: None,
        }
    }

    /// Units available for new reservations.
    ///
    /// Derived, never stored: `current_stock - reserved_stock`. The
    /// subtraction cannot underflow while the commit invariant holds.
    #[must_use]
    pub const fn available_stock(&self) -> u32 {
        self.current_stock - self.reserved_stock
    }

    /// Whether current stock has fallen to the warning threshold.
    #[must_use]
    pub const fn is_low_stock(&self) -> bool {
        self.current_stock <= self.warning_threshold
    }

    /// Apply a transition to this record in memory.
    ///
    /// All preconditions are checked before any field is mutated; on error
    /// the record is guaranteed unchanged. The version is left alone — the
    /// store bumps it when the conditioned write commits.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::InvalidQuantity`] for a zero quantity
    /// - [`InventoryError::InsufficientStock`] when the precondition in the
    ///   table below fails
    /// - [`InventoryError::StockOverflow`] when an increase would push
    ///   holdings past the representable bound
    ///
    /// | Transition | Precondition |
    /// |---|---|
    /// | `Reserve(qty)` | `available_stock() >= qty` |
    /// | `CancelReserve(qty)` | none (clamps at zero) |
    /// | `ConfirmReserve(qty)` | `reserved_stock >= qty` |
    /// | `Increase(qty)` | `current_stock + qty` fits in `u32` |
    /// | `Decrease(qty)` / `RecordDamage(qty)` | `available_stock() >= qty` |
    pub fn apply(&mut self, transition: StockTransition) -> Result<(), InventoryError> {
        if let Some(qty) = transition.quantity() {
            if qty == 0 {
                return Err(InventoryError::InvalidQuantity { qty: 0 });
            }
        }

        match transition {
            StockTransition::Reserve(qty) => {
                let available = self.available_stock();
                if available < qty {
                    return Err(self.insufficient(qty, available));
                }
                self.reserved_stock += qty;
            },
            StockTransition::CancelReserve(qty) => {
                self.reserved_stock = self.reserved_stock.saturating_sub(qty);
            },
            StockTransition::ConfirmReserve(qty) => {
                if self.reserved_stock < qty {
                    return Err(self.insufficient(qty, self.reserved_stock));
                }
                self.reserved_stock -= qty;
                self.current_stock -= qty;
                self.outbound_total += u64::from(qty);
            },
            StockTransition::Increase(qty) => {
                let Some(updated) = self.current_stock.checked_add(qty) else {
                    return Err(InventoryError::StockOverflow {
                        sku_id: self.sku_id.clone(),
                        qty,
                        current: self.current_stock,
                    });
                };
                self.current_stock = updated;
                self.inbound_total += u64::from(qty);
            },
            StockTransition::Decrease(qty) => {
                // A plain decrease may not cut into units already promised
                // to reservations.
                let available = self.available_stock();
                if available < qty {
                    return Err(self.insufficient(qty, available));
                }
                self.current_stock -= qty;
                self.outbound_total += u64::from(qty);
            },
            StockTransition::RecordDamage(qty) => {
                let available = self.available_stock();
                if available < qty {
                    return Err(self.insufficient(qty, available));
                }
                self.current_stock -= qty;
                self.damage_count += u64::from(qty);
            },
            StockTransition::Check { at } => {
                self.last_check_time = Some(at);
            },
        }

        debug_assert!(self.reserved_stock <= self.current_stock);
        Ok(())
    }

    fn insufficient(&self, requested: u32, available: u32) -> InventoryError {
        InventoryError::InsufficientStock {
            sku_id: self.sku_id.clone(),
            requested,
            available,
        }
    }
}
