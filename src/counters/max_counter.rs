//! Up/down counter with a high-water mark.
//!
//! This module provides [`MaxCounter`], a named gauge that can go up and down
//! and remembers the highest value it has reached since the last reset.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicI64, Ordering};

use crossbeam_utils::CachePadded;

use crate::registry::Instrument;

/// A named gauge with a monotonically non-decreasing high-water mark.
///
/// # Algorithm
///
/// The value is updated with a plain `fetch_add`/`fetch_sub`. After every
/// increase the new value is offered to `max` through a compare-and-swap
/// loop that only ever raises it: if a concurrent update has already pushed
/// `max` at or above the offered value, the offer is dropped.
///
/// `max >= value` does not hold in general (the value can drop after a
/// decrement), but `max` never decreases between resets.
///
/// # Examples
///
/// ```rust
/// use hedron_instrument::counters::MaxCounter;
///
/// let in_flight = MaxCounter::new("in_flight");
/// in_flight.increment();
/// in_flight.increment();
/// in_flight.decrement();
///
/// assert_eq!(in_flight.get(), 1);
/// assert_eq!(in_flight.get_max(), 2);
/// ```
pub struct MaxCounter {
    name: String,
    value: CachePadded<AtomicI64>,
    max: CachePadded<AtomicI64>,
}

/// Point-in-time copy of a [`MaxCounter`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaxCounterSnapshot {
    /// The name of the counter.
    pub name: String,
    /// The current value.
    pub value: i64,
    /// The high-water mark.
    pub max: i64,
}

impl MaxCounter {
    /// Creates a counter with value and high-water mark at zero.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            value: CachePadded::new(AtomicI64::new(0)),
            max: CachePadded::new(AtomicI64::new(0)),
        }
    }

    /// Adds one and returns the new value.
    #[inline]
    pub fn increment(&self) -> i64 {
        self.add(1)
    }

    /// Subtracts one and returns the new value. The high-water mark is untouched.
    #[inline]
    pub fn decrement(&self) -> i64 {
        self.value.fetch_sub(1, Ordering::Relaxed).wrapping_sub(1)
    }

    /// Adds `delta` (which may be negative) and returns the new value.
    #[inline]
    pub fn add(&self, delta: i64) -> i64 {
        let value = self.value.fetch_add(delta, Ordering::Relaxed).wrapping_add(delta);
        if delta > 0 {
            self.raise_max(value);
        }
        value
    }

    /// Returns the current value.
    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Returns the high-water mark.
    #[inline]
    pub fn get_max(&self) -> i64 {
        self.max.load(Ordering::Relaxed)
    }

    /// Returns `(value, max)` and resets both to zero.
    ///
    /// The pair is not reset atomically. `max` goes first, so a concurrent
    /// increment can leave a stale high mark but never a mark below the value.
    pub fn value_and_reset(&self) -> (i64, i64) {
        let max = self.max.swap(0, Ordering::AcqRel);
        let value = self.value.swap(0, Ordering::AcqRel);
        (value, max)
    }

    /// Returns the name of this counter.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn raise_max(&self, candidate: i64) {
        let mut current = self.max.load(Ordering::Relaxed);
        while candidate > current {
            match self.max.compare_exchange_weak(
                current,
                candidate,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Instrument for MaxCounter {
    type Snapshot = MaxCounterSnapshot;

    const KIND: &'static str = "MaxCounter";
    const COLUMNS: &'static [&'static str] = &["count", "max"];

    fn name(&self) -> &str {
        &self.name
    }

    fn is_unused(&self) -> bool {
        self.get() == 0 && self.get_max() == 0
    }

    fn values(&self) -> Vec<String> {
        vec![self.get().to_string(), self.get_max().to_string()]
    }

    fn reset(&self) {
        self.value_and_reset();
    }

    fn snapshot(&self) -> MaxCounterSnapshot {
        MaxCounterSnapshot {
            name: self.name.clone(),
            value: self.get(),
            max: self.get_max(),
        }
    }
}

impl Debug for MaxCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{ {} max:{} }}", self.name, self.get(), self.get_max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new() {
        let counter = MaxCounter::new("m");
        assert_eq!(counter.get(), 0);
        assert_eq!(counter.get_max(), 0);
        assert!(counter.is_unused());
    }

    #[test]
    fn test_increment_returns_new_value() {
        let counter = MaxCounter::new("m");
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.decrement(), 1);
    }

    #[test]
    fn test_decrement_keeps_max() {
        let counter = MaxCounter::new("m");
        for _ in 0..5 {
            counter.increment();
        }
        for _ in 0..5 {
            counter.decrement();
        }
        assert_eq!(counter.get(), 0);
        assert_eq!(counter.get_max(), 5);
        assert!(!counter.is_unused());
    }

    #[test]
    fn test_negative_values_never_raise_max() {
        let counter = MaxCounter::new("m");
        counter.decrement();
        counter.decrement();
        counter.increment();
        assert_eq!(counter.get(), -1);
        assert_eq!(counter.get_max(), 0);
    }

    #[test]
    fn test_add() {
        let counter = MaxCounter::new("m");
        assert_eq!(counter.add(10), 10);
        assert_eq!(counter.add(-7), 3);
        assert_eq!(counter.get_max(), 10);
    }

    #[test]
    fn test_value_and_reset() {
        let counter = MaxCounter::new("m");
        counter.add(4);
        counter.decrement();
        assert_eq!(counter.value_and_reset(), (3, 4));
        assert!(counter.is_unused());
    }

    #[test]
    fn test_values() {
        let counter = MaxCounter::new("m");
        counter.add(3);
        counter.decrement();
        assert_eq!(counter.values(), vec!["2".to_string(), "3".to_string()]);
    }

    #[test]
    fn test_debug() {
        let counter = MaxCounter::new("queue");
        counter.add(2);
        assert_eq!(format!("{:?}", counter), "queue{ 2 max:2 }");
    }

    #[test]
    fn test_reset_under_contention_keeps_max_above_value() {
        const THREADS: i64 = 4;
        const ITERATIONS: i64 = 20_000;

        let counter = Arc::new(MaxCounter::new("reset"));
        let mut handles = vec![];

        for _ in 0..THREADS {
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                for _ in 0..ITERATIONS {
                    counter.increment();
                }
            }));
        }

        let mut drained = 0;
        while handles.iter().any(|h| !h.is_finished()) {
            let (value, max) = counter.value_and_reset();
            assert!(max >= 0);
            drained += value;
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(counter.get_max() >= counter.get());
        assert_eq!(drained + counter.get(), THREADS * ITERATIONS);
    }

    #[test]
    fn test_max_never_decreases_under_contention() {
        const THREADS: i64 = 8;
        const ITERATIONS: i64 = 5_000;

        let counter = Arc::new(MaxCounter::new("contended"));
        let mut handles = vec![];

        for _ in 0..THREADS {
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                for _ in 0..ITERATIONS {
                    let value = counter.increment();
                    assert!(counter.get_max() >= value);
                    counter.decrement();
                }
            }));
        }

        let mut last_max = 0;
        while handles.iter().any(|h| !h.is_finished()) {
            let max = counter.get_max();
            assert!(max >= last_max);
            last_max = max;
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.get(), 0);
        assert!(counter.get_max() >= 1);
        assert!(counter.get_max() <= THREADS);
    }
}
