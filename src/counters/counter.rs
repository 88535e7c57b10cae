//! Monotonically incrementing named counter.
//!
//! This module provides [`Counter`], a single cache-padded `AtomicI64` with a
//! name. It is the cheapest instrument in the crate: an increment is one
//! relaxed `fetch_add`.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicI64, Ordering};

use crossbeam_utils::CachePadded;

use crate::registry::Instrument;

/// A named event counter.
///
/// The value sits on its own cache line so that hot counters registered next
/// to each other do not falsely share.
///
/// # Examples
///
/// ```rust
/// use hedron_instrument::counters::Counter;
///
/// let counter = Counter::new("requests");
/// counter.increment();
/// counter.add(4);
/// assert_eq!(counter.get(), 5);
/// assert_eq!(counter.value_and_reset(), 5);
/// assert_eq!(counter.get(), 0);
/// ```
///
/// Multi-threaded usage:
///
/// ```rust
/// use hedron_instrument::counters::Counter;
/// use std::sync::Arc;
/// use std::thread;
///
/// let counter = Arc::new(Counter::new("jobs"));
/// let handles: Vec<_> = (0..4)
///     .map(|_| {
///         let c = Arc::clone(&counter);
///         thread::spawn(move || {
///             for _ in 0..1000 {
///                 c.increment();
///             }
///         })
///     })
///     .collect();
///
/// for h in handles {
///     h.join().unwrap();
/// }
///
/// assert_eq!(counter.get(), 4000);
/// ```
pub struct Counter {
    name: String,
    value: CachePadded<AtomicI64>,
}

/// Point-in-time copy of a [`Counter`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CounterSnapshot {
    /// The name of the counter.
    pub name: String,
    /// The value of the counter.
    pub value: i64,
}

impl Counter {
    /// Creates a counter at zero.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            value: CachePadded::new(AtomicI64::new(0)),
        }
    }

    /// Adds one.
    #[inline]
    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds `count`.
    #[inline]
    pub fn add(&self, count: u32) {
        self.value.fetch_add(i64::from(count), Ordering::Relaxed);
    }

    /// Returns the current value.
    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Returns the current value and sets the counter back to zero.
    #[inline]
    pub fn value_and_reset(&self) -> i64 {
        self.value.swap(0, Ordering::Relaxed)
    }

    /// Returns the name of this counter.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Instrument for Counter {
    type Snapshot = CounterSnapshot;

    const KIND: &'static str = "Counter";
    const COLUMNS: &'static [&'static str] = &["count"];

    fn name(&self) -> &str {
        &self.name
    }

    fn is_unused(&self) -> bool {
        self.get() == 0
    }

    fn values(&self) -> Vec<String> {
        vec![self.get().to_string()]
    }

    fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            name: self.name.clone(),
            value: self.get(),
        }
    }
}

impl Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{ {} }}", self.name, self.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new() {
        let counter = Counter::new("c");
        assert_eq!(counter.get(), 0);
        assert_eq!(counter.name(), "c");
        assert!(counter.is_unused());
    }

    #[test]
    fn test_increment_and_add() {
        let counter = Counter::new("c");
        counter.increment();
        counter.add(41);
        assert_eq!(counter.get(), 42);
        assert!(!counter.is_unused());
    }

    #[test]
    fn test_value_and_reset() {
        let counter = Counter::new("c");
        counter.add(7);
        assert_eq!(counter.value_and_reset(), 7);
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn test_instrument_reset() {
        let counter = Counter::new("c");
        counter.add(7);
        Instrument::reset(&counter);
        assert!(counter.is_unused());
    }

    #[test]
    fn test_values_and_snapshot() {
        let counter = Counter::new("hits");
        counter.add(3);
        assert_eq!(counter.values(), vec!["3".to_string()]);
        assert_eq!(
            counter.snapshot(),
            CounterSnapshot {
                name: "hits".to_string(),
                value: 3
            }
        );
    }

    #[test]
    fn test_debug() {
        let counter = Counter::new("hits");
        counter.add(9);
        assert_eq!(format!("{:?}", counter), "hits{ 9 }");
    }

    #[test]
    fn test_stress_exact_total() {
        const THREADS: usize = 16;
        const ITERATIONS: usize = 10_000;

        let counter = Arc::new(Counter::new("stress"));
        let mut handles = vec![];

        for _ in 0..THREADS {
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                for _ in 0..ITERATIONS {
                    counter.increment();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.get(), (THREADS * ITERATIONS) as i64);
    }

    #[test]
    fn test_reads_never_go_backwards() {
        let counter = Arc::new(Counter::new("monotone"));
        let writer = {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..50_000 {
                    counter.increment();
                }
            })
        };

        let mut last = 0;
        while !writer.is_finished() {
            let now = counter.get();
            assert!(now >= last);
            last = now;
        }
        writer.join().unwrap();
        assert_eq!(counter.get(), 50_000);
    }
}
