//! Deterministic [`Clock`] and [`Sleeper`] implementations.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use futures::future::BoxFuture;
use holdfast_core::environment::{Clock, Sleeper};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Fixed clock for deterministic tests.
///
/// Always returns the same time, making tests reproducible.
///
/// # Example
///
/// ```
/// use holdfast_testing::mocks::FixedClock;
/// use holdfast_core::environment::Clock;
/// use chrono::Utc;
///
/// let clock = FixedClock::new(Utc::now());
/// assert_eq!(clock.now(), clock.now());
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time.
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// A [`FixedClock`] pinned to 2025-01-01T00:00:00Z.
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap_or_default())
}

/// Settable clock for tests that need time to pass.
///
/// Starts at a given instant and only moves when [`advance`](Self::advance)
/// is called (or when a [`ClockSleeper`] sleeps against it).
#[derive(Debug)]
pub struct ManualClock {
    time: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a manual clock starting at `time`.
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Mutex::new(time),
        }
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: ChronoDuration) {
        let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
        *time += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sleeper that completes immediately. Retry and polling loops run at full
/// speed with no wall-clock dependency.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantSleeper;

impl Sleeper for InstantSleeper {
    fn sleep(&self, _duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

/// Sleeper that advances a [`ManualClock`] by the requested duration instead
/// of suspending.
///
/// Pairing this with the clock it advances makes timeout windows elapse
/// deterministically: every poll "takes" exactly its poll interval.
#[derive(Debug, Clone)]
pub struct ClockSleeper {
    clock: Arc<ManualClock>,
}

impl ClockSleeper {
    /// Create a sleeper that drives `clock`.
    #[must_use]
    pub const fn new(clock: Arc<ManualClock>) -> Self {
        Self { clock }
    }
}

impl Sleeper for ClockSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        let delta = ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::MAX);
        self.clock.advance(delta);
        Box::pin(async {})
    }
}

/// Sleeper that records every requested duration and completes immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Create a recording sleeper with no sleeps recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All durations requested so far, in order.
    #[must_use]
    pub fn slept(&self) -> Vec<Duration> {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        Box::pin(async {})
    }
}
