//! Concurrency control for Holdfast stock writes.
//!
//! Two cooperating paths guard every mutation of a [`holdfast_core::stock::StockRecord`]:
//!
//! - [`optimistic`]: the default. Read the record, apply the transition in
//!   memory, commit conditioned on the observed version; retry a bounded
//!   number of times with linear backoff when another writer got there
//!   first.
//! - [`lease_lock`]: the escalation path. A leased row-level lock grants a
//!   single writer exclusivity per `(SKU, operation class)` until its TTL
//!   expires, so progress is guaranteed under sustained contention and no
//!   crashed holder can wedge a SKU forever.
//!
//! [`facade`] wires both together behind one service type and mirrors
//! committed counts onto the read-side projection.

pub mod facade;
pub mod lease_lock;
pub mod optimistic;

pub use facade::InventoryService;
pub use lease_lock::{LeaseCoordinator, LeasePolicy};
pub use optimistic::{OptimisticEngine, RetryPolicy};
