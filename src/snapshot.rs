//! Serializable snapshot of a whole [`Instrumentation`](crate::instrumentation::Instrumentation).
//!
//! # Feature Flag
//!
//! This module requires the `serde` feature:
//!
//! ```toml
//! [dependencies]
//! hedron-instrument = { version = "0.3", features = ["serde"] }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use hedron_instrument::instrumentation::Instrumentation;
//!
//! let instruments = Instrumentation::new()?;
//! instruments.counter("requests").add(42);
//!
//! let snapshot = instruments.snapshot(true);
//! assert_eq!(snapshot.counter("requests").map(|c| c.value), Some(42));
//!
//! // Any serde format works.
//! let json = serde_json::to_string(&snapshot)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::counters::{
    CounterRangeSnapshot, CounterSnapshot, CounterThroughputSnapshot, MaxCounterSnapshot,
};
use crate::timed_scope::TimedScopeSnapshot;

/// Deep copy of every instrument of one context, each kind sorted by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    /// Optional timestamp in milliseconds since Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u64>,
    pub counters: Vec<CounterSnapshot>,
    pub max_counters: Vec<MaxCounterSnapshot>,
    pub counter_ranges: Vec<CounterRangeSnapshot>,
    pub throughputs: Vec<CounterThroughputSnapshot>,
    pub timed_scopes: Vec<TimedScopeSnapshot>,
}

impl MetricsSnapshot {
    /// Returns this snapshot stamped with `timestamp_ms`.
    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    /// Finds a counter by name.
    pub fn counter(&self, name: &str) -> Option<&CounterSnapshot> {
        self.counters.iter().find(|c| c.name == name)
    }

    /// Finds a max counter by name.
    pub fn max_counter(&self, name: &str) -> Option<&MaxCounterSnapshot> {
        self.max_counters.iter().find(|c| c.name == name)
    }

    /// Finds a range counter by name.
    pub fn counter_range(&self, name: &str) -> Option<&CounterRangeSnapshot> {
        self.counter_ranges.iter().find(|c| c.name == name)
    }

    /// Finds a throughput counter by name.
    pub fn throughput(&self, name: &str) -> Option<&CounterThroughputSnapshot> {
        self.throughputs.iter().find(|c| c.name == name)
    }

    /// Finds a timed scope by name.
    pub fn timed_scope(&self, name: &str) -> Option<&TimedScopeSnapshot> {
        self.timed_scopes.iter().find(|s| s.name == name)
    }

    /// Total number of instruments in the snapshot.
    pub fn len(&self) -> usize {
        self.counters.len()
            + self.max_counters.len()
            + self.counter_ranges.len()
            + self.throughputs.len()
            + self.timed_scopes.len()
    }

    /// Returns `true` if the snapshot holds no instruments.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::RangeEntry;

    fn sample() -> MetricsSnapshot {
        MetricsSnapshot {
            counters: vec![CounterSnapshot {
                name: "requests".to_string(),
                value: 42,
            }],
            counter_ranges: vec![CounterRangeSnapshot {
                name: "status".to_string(),
                entries: vec![RangeEntry { key: 200, delta: 3 }],
            }],
            ..MetricsSnapshot::default()
        }
    }

    #[test]
    fn test_lookup_by_name() {
        let snapshot = sample();
        assert_eq!(snapshot.counter("requests").map(|c| c.value), Some(42));
        assert!(snapshot.counter("missing").is_none());
        assert_eq!(snapshot.counter_range("status").unwrap().entries.len(), 1);
        assert!(snapshot.timed_scope("status").is_none());
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.is_empty());
        assert!(MetricsSnapshot::default().is_empty());
    }

    #[test]
    fn test_with_timestamp() {
        let snapshot = MetricsSnapshot::default().with_timestamp(1_700_000_000_000);
        assert_eq!(snapshot.timestamp_ms, Some(1_700_000_000_000));
    }
}
