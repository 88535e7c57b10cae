//! Time sources for epoch bucketing and scope timing.
//!
//! Instruments never read the system clock directly; they ask a [`Clock`].
//! Production code uses [`MonotonicClock`], tests swap in a [`ManualClock`]
//! to drive epoch rollover deterministically.

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

/// Nanoseconds per millisecond.
pub(crate) const NANOS_PER_MILLI: i64 = 1_000_000;

/// A source of monotonically increasing nanosecond timestamps.
///
/// Only differences between readings are meaningful; the origin is
/// arbitrary but fixed for the lifetime of the clock.
pub trait Clock: Debug + Send + Sync {
    /// Returns the current time in nanoseconds since the clock's origin.
    fn time_in_nanoseconds(&self) -> i64;

    /// Returns the current time in whole milliseconds since the clock's origin.
    fn time_in_milliseconds(&self) -> i64 {
        self.time_in_nanoseconds().div_euclid(NANOS_PER_MILLI)
    }
}

/// A [`Clock`] backed by [`Instant`], with its origin at construction time.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Creates a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn time_in_nanoseconds(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }
}

/// A [`Clock`] that only moves when told to.
///
/// # Examples
///
/// ```rust
/// use hedron_instrument::clock::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new(0);
/// clock.advance(Duration::from_millis(250));
/// assert_eq!(clock.time_in_milliseconds(), 250);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicI64,
}

impl ManualClock {
    /// Creates a clock reading `nanos`.
    pub const fn new(nanos: i64) -> Self {
        Self {
            nanos: AtomicI64::new(nanos),
        }
    }

    /// Sets the current reading.
    pub fn set_nanoseconds(&self, nanos: i64) {
        self.nanos.store(nanos, Ordering::Release);
    }

    /// Sets the current reading in milliseconds.
    pub fn set_milliseconds(&self, millis: i64) {
        self.set_nanoseconds(millis.saturating_mul(NANOS_PER_MILLI));
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let delta = i64::try_from(by.as_nanos()).unwrap_or(i64::MAX);
        self.nanos
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |now| {
                Some(now.saturating_add(delta))
            })
            .ok();
    }
}

impl Clock for ManualClock {
    #[inline]
    fn time_in_nanoseconds(&self) -> i64 {
        self.nanos.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_moves_forward() {
        let clock = MonotonicClock::new();
        let first = clock.time_in_nanoseconds();
        std::thread::sleep(Duration::from_millis(2));
        let second = clock.time_in_nanoseconds();
        assert!(second > first);
        assert!(second - first >= 2 * NANOS_PER_MILLI);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(5);
        assert_eq!(clock.time_in_nanoseconds(), 5);

        clock.set_milliseconds(3);
        assert_eq!(clock.time_in_nanoseconds(), 3_000_000);
        assert_eq!(clock.time_in_milliseconds(), 3);

        clock.advance(Duration::from_micros(1500));
        assert_eq!(clock.time_in_nanoseconds(), 4_500_000);
        assert_eq!(clock.time_in_milliseconds(), 4);
    }

    #[test]
    fn test_negative_millis_round_down() {
        let clock = ManualClock::new(-1);
        assert_eq!(clock.time_in_milliseconds(), -1);
    }
}
