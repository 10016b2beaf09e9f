//! Dependency injection traits for time and sleeping.
//!
//! The retry loop and the lease acquisition loop are the subsystem's only
//! suspension points, and both time and sleeping are injected behind traits
//! so tests can simulate version conflicts and lease expiry without real
//! timing dependency.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::time::Duration;

/// Clock trait - abstracts time operations for testability.
///
/// # Examples
///
/// ```
/// use holdfast_core::environment::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// let now = clock.now();
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Sleeper trait - abstracts suspension for backoff and lock polling.
///
/// Production uses [`TokioSleeper`]; tests inject a sleeper that returns
/// immediately (and may record the requested durations) so retry and
/// acquisition logic runs deterministically.
pub trait Sleeper: Send + Sync {
    /// Suspend for the given duration.
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()>;
}

/// Production sleeper backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}
