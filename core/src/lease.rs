//! Leased-lock row and operation classes.
//!
//! A [`LeaseLock`] is the coordination primitive for the pessimistic fallback
//! path: at most one *active* row exists per (`sku_id`, `operation_class`)
//! pair, enforced by a uniqueness constraint in the store. The lease carries
//! an expiry instant; a lease that is never released (holder crashed) simply
//! dies at `expiry_time` and is reclaimed by the next acquirer. That TTL is
//! the deadlock-avoidance mechanism — no lease is ever held indefinitely.
//!
//! The lock does not reference the stock record it protects; the coupling is
//! purely by shared `sku_id`.

use crate::sku::{HolderId, SkuId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The class of operation a lease serializes.
///
/// Leases are scoped per class, so a hot `Reserve` path does not block a
/// concurrent `Restock` on the same SKU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationClass {
    /// Reservation bookkeeping (reserve / cancel).
    Reserve,
    /// Stock-reducing operations (confirm, decrease, damage write-off).
    Deduct,
    /// Stock-increasing operations.
    Restock,
    /// Stock-take / audit operations.
    Check,
}

impl OperationClass {
    /// Stable string form used as part of the store's unique key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reserve => "RESERVE",
            Self::Deduct => "DEDUCT",
            Self::Restock => "RESTOCK",
            Self::Check => "CHECK",
        }
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An exclusive lease on one (`sku_id`, `operation_class`) pair.
///
/// Created on successful acquisition (an insert that fails on the uniqueness
/// constraint signals "already held"); destroyed on release or when a
/// competing acquirer reclaims it after expiry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseLock {
    /// The SKU this lease covers.
    pub sku_id: SkuId,
    /// The operation class this lease serializes.
    pub operation_class: OperationClass,
    /// Caller-supplied identifier naming the current holder.
    pub holder_id: HolderId,
    /// The lease dies at this instant regardless of holder state.
    pub expiry_time: DateTime<Utc>,
    /// Soft-release flag; a released-but-not-yet-deleted row reads inactive.
    pub is_active: bool,
}

impl LeaseLock {
    /// Create a new active lease expiring at `expiry_time`.
    #[must_use]
    pub const fn new(
        sku_id: SkuId,
        operation_class: OperationClass,
        holder_id: HolderId,
        expiry_time: DateTime<Utc>,
    ) -> Self {
        Self {
            sku_id,
            operation_class,
            holder_id,
            expiry_time,
            is_active: true,
        }
    }

    /// Whether the lease has passed its expiry instant.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry_time
    }

    /// Whether the lease still grants exclusivity: active and not expired.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired(now)
    }
}
