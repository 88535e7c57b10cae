//! Sparse per-key counters.
//!
//! This module provides [`CounterRange`], which accumulates a delta per `i64`
//! key without declaring the key space up front. Typical keys are response
//! codes, batch sizes or retry counts.

use std::fmt::{self, Debug, Display};

use crate::atomic_snapshot::AtomicSnapshot;
use crate::registry::Instrument;

/// One `(key, delta)` pair of a [`CounterRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeEntry {
    /// The bucket key.
    pub key: i64,
    /// Sum of every delta added under `key`.
    pub delta: i64,
}

// Strictly increasing by key, no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SortedEntries(Vec<RangeEntry>);

impl SortedEntries {
    fn with_delta(&self, key: i64, delta: i64) -> Self {
        let index = self.0.partition_point(|entry| entry.key < key);
        let mut entries = self.0.clone();
        match entries.get_mut(index) {
            Some(entry) if entry.key == key => {
                entry.delta = entry.delta.wrapping_add(delta);
            }
            _ => entries.insert(index, RangeEntry { key, delta }),
        }
        Self(entries)
    }
}

impl Display for SortedEntries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}:{}", entry.key, entry.delta)?;
        }
        Ok(())
    }
}

/// A named, sorted `key -> delta` counter with lock-free updates.
///
/// Every [`add`](Self::add) builds a new sorted entry list from the current
/// one and swaps it in with a compare-and-swap, retrying on conflict. Entries
/// are never mutated in place, so a reader always sees a complete list.
///
/// # Examples
///
/// ```rust
/// use hedron_instrument::counters::CounterRange;
///
/// let status = CounterRange::new("http_status");
/// status.increment(200);
/// status.increment(404);
/// status.add(200, 9);
///
/// assert_eq!(status.get(200), 10);
/// assert_eq!(status.to_string(), "200:10; 404:1");
/// ```
pub struct CounterRange {
    name: String,
    entries: AtomicSnapshot<SortedEntries>,
}

/// Point-in-time copy of a [`CounterRange`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CounterRangeSnapshot {
    /// The name of the counter.
    pub name: String,
    /// Entries sorted by ascending key.
    pub entries: Vec<RangeEntry>,
}

impl CounterRange {
    /// Creates an empty range counter.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            entries: AtomicSnapshot::default(),
        }
    }

    /// Adds `delta` to the entry for `key`, inserting it if absent.
    pub fn add(&self, key: i64, delta: i64) {
        self.entries.update(|current| current.with_delta(key, delta));
    }

    /// Adds one to the entry for `key`.
    #[inline]
    pub fn increment(&self, key: i64) {
        self.add(key, 1);
    }

    /// Returns the accumulated delta for `key`, or `0` if it was never added.
    pub fn get(&self, key: i64) -> i64 {
        let entries = self.entries.load();
        entries
            .0
            .binary_search_by_key(&key, |entry| entry.key)
            .map_or(0, |index| entries.0[index].delta)
    }

    /// Returns a copy of the entries, sorted by ascending key.
    pub fn entries(&self) -> Vec<RangeEntry> {
        self.entries.load().0.clone()
    }

    /// Returns the name of this counter.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for CounterRange {
    /// Formats the entries as `key:delta` joined by `"; "`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&*self.entries.load(), f)
    }
}

impl Instrument for CounterRange {
    type Snapshot = CounterRangeSnapshot;

    const KIND: &'static str = "CounterRange";
    const COLUMNS: &'static [&'static str] = &["ranges"];

    fn name(&self) -> &str {
        &self.name
    }

    fn is_unused(&self) -> bool {
        self.entries.load().0.is_empty()
    }

    fn values(&self) -> Vec<String> {
        vec![format!("[{self}]")]
    }

    fn reset(&self) {
        self.entries.store(SortedEntries::default());
    }

    fn snapshot(&self) -> CounterRangeSnapshot {
        CounterRangeSnapshot {
            name: self.name.clone(),
            entries: self.entries(),
        }
    }
}

impl Debug for CounterRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{ {} }}", self.name, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::thread;

    fn assert_strictly_sorted(entries: &[RangeEntry]) {
        for pair in entries.windows(2) {
            assert!(pair[0].key < pair[1].key, "not strictly sorted: {entries:?}");
        }
    }

    #[test]
    fn test_new_is_unused() {
        let range = CounterRange::new("r");
        assert!(range.is_unused());
        assert!(range.entries().is_empty());
        assert_eq!(range.to_string(), "");
    }

    #[test]
    fn test_insert_in_order() {
        let range = CounterRange::new("r");
        range.add(5, 1);
        range.add(-3, 2);
        range.add(10, 3);
        range.add(0, 4);

        let keys: Vec<i64> = range.entries().iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![-3, 0, 5, 10]);
    }

    #[test]
    fn test_existing_key_is_summed() {
        let range = CounterRange::new("r");
        range.add(7, 2);
        range.add(7, 3);
        range.add(7, -1);
        assert_eq!(range.entries(), vec![RangeEntry { key: 7, delta: 4 }]);
        assert_eq!(range.get(7), 4);
        assert_eq!(range.get(8), 0);
    }

    #[test]
    fn test_display_and_values() {
        let range = CounterRange::new("sizes");
        range.increment(64);
        range.increment(8);
        range.add(64, 2);
        assert_eq!(range.to_string(), "8:1; 64:3");
        assert_eq!(range.values(), vec!["[8:1; 64:3]".to_string()]);
        assert_eq!(format!("{:?}", range), "sizes{ 8:1; 64:3 }");
    }

    #[test]
    fn test_reset() {
        let range = CounterRange::new("r");
        range.increment(1);
        Instrument::reset(&range);
        assert!(range.is_unused());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let range = CounterRange::new("r");
        range.increment(1);
        let snapshot = range.snapshot();
        range.increment(2);
        assert_eq!(snapshot.entries.len(), 1);
        assert_eq!(range.entries().len(), 2);
    }

    #[test]
    fn test_concurrent_adds() {
        const THREADS: i64 = 8;
        const ITERATIONS: i64 = 2_000;

        let range = Arc::new(CounterRange::new("concurrent"));
        let mut handles = vec![];

        for t in 0..THREADS {
            let range = Arc::clone(&range);
            handles.push(thread::spawn(move || {
                for i in 0..ITERATIONS {
                    range.add((i + t) % 17, 1);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let mut expected = BTreeMap::new();
        for t in 0..THREADS {
            for i in 0..ITERATIONS {
                *expected.entry((i + t) % 17).or_insert(0i64) += 1;
            }
        }

        let entries = range.entries();
        assert_strictly_sorted(&entries);
        assert_eq!(entries.len(), expected.len());
        for entry in entries.iter() {
            assert_eq!(Some(&entry.delta), expected.get(&entry.key), "key {}", entry.key);
        }
        let total: i64 = entries.iter().map(|e| e.delta).sum();
        assert_eq!(total, THREADS * ITERATIONS);
    }

    proptest! {
        #[test]
        fn test_matches_sorted_map(ops in proptest::collection::vec((-50i64..50, -1000i64..1000), 0..300)) {
            let range = CounterRange::new("prop");
            let mut expected = BTreeMap::new();
            for (key, delta) in &ops {
                range.add(*key, *delta);
                *expected.entry(*key).or_insert(0i64) += *delta;
            }

            let entries = range.entries();
            assert_strictly_sorted(&entries);
            let actual: Vec<(i64, i64)> = entries.iter().map(|e| (e.key, e.delta)).collect();
            let expected: Vec<(i64, i64)> = expected.into_iter().collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
