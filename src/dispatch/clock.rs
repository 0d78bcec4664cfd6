//! Clock sources for took-time measurement
//!
//! The dispatcher reads its clock once when a batch starts and once when the
//! last slot completes. Readings are nanosecond offsets and are only
//! comparable when taken from the same clock instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Opaque monotonic reading in nanoseconds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockReading(u64);

impl ClockReading {
    pub fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Duration elapsed since an earlier reading of the same clock.
    /// Saturates to zero if the clock went backwards.
    pub fn duration_since(&self, earlier: ClockReading) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

/// Source of monotonic time readings
pub trait Clock: Send + Sync {
    fn now(&self) -> ClockReading;
}

impl<F> Clock for F
where
    F: Fn() -> u64 + Send + Sync,
{
    fn now(&self) -> ClockReading {
        ClockReading::from_nanos(self())
    }
}

/// Real monotonic clock backed by [`Instant`]
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    anchor: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> ClockReading {
        ClockReading::from_nanos(self.anchor.elapsed().as_nanos() as u64)
    }
}

/// Controllable clock for deterministic took-time
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(nanos: u64) -> Self {
        Self {
            nanos: AtomicU64::new(nanos),
        }
    }

    pub fn set_nanos(&self, nanos: u64) {
        self.nanos.store(nanos, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn get_nanos(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> ClockReading {
        ClockReading::from_nanos(self.get_nanos())
    }
}
