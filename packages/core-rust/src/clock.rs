//! Wall-clock abstraction for item timestamps.
//!
//! Resources stamp `createdAt`/`updatedAt` through a [`ClockSource`] so tests
//! can replace the real clock with a deterministic one.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Abstraction over the system clock for dependency injection.
///
/// The default implementation ([`SystemClock`]) delegates to `chrono::Utc::now`.
pub trait ClockSource: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// Default clock source that reads the real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Shared handle to a clock, as stored by resources.
pub type SharedClock = Arc<dyn ClockSource>;

/// Returns the process-wide default clock.
#[must_use]
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

/// Clock that only moves when told to.
///
/// Every call to [`ClockSource::now`] returns the current instant and then
/// advances it by `step`, so consecutive writes get strictly increasing
/// timestamps.
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl FixedClock {
    /// Creates a clock starting at `start` that advances by `step` per reading.
    #[must_use]
    pub fn new(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            current: Mutex::new(start),
            step,
        }
    }

    /// Moves the clock forward without producing a reading.
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock();
        *current += by;
    }
}

impl ClockSource for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let mut current = self.current.lock();
        let reading = *current;
        *current += self.step;
        reading
    }
}
