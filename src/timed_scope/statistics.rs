//! Aggregated timing statistics of a timed scope.

use std::fmt::{self, Display};

use crate::clock::NANOS_PER_MILLI;
use crate::histogram::LogarithmicHistogram32;

use super::outcome::ScopeOutcome;

/// Report columns of a timed scope, after the name column.
pub(crate) const COLUMNS: &[&str] = &[
    "totalMsec",
    "executions",
    "successful",
    "slow",
    "minMsec",
    "maxMsec",
    "avgMsec",
    "avgMsecExcludingSlowest",
    "histogram",
];

/// Immutable aggregate over every execution of a timed scope.
///
/// A new value is derived from the previous one plus a single outcome, so a
/// scope can publish it with a compare-and-swap and readers always see the
/// counts and durations of the same set of executions.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimedScopeStatistics {
    duration_total_ns: i64,
    executions_count: u64,
    successful_executions_count: u64,
    slow_executions_count: u64,
    duration_min_ns: i64,
    duration_max_ns: i64,
    histogram_msec: LogarithmicHistogram32,
}

impl Default for TimedScopeStatistics {
    fn default() -> Self {
        Self {
            duration_total_ns: 0,
            executions_count: 0,
            successful_executions_count: 0,
            slow_executions_count: 0,
            duration_min_ns: i64::MAX,
            duration_max_ns: 0,
            histogram_msec: LogarithmicHistogram32::new(),
        }
    }
}

impl TimedScopeStatistics {
    /// Creates empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns these statistics with `outcome` folded in.
    ///
    /// An outcome that has not completed counts as a zero-length failure.
    #[must_use]
    pub fn calculate(&self, outcome: &ScopeOutcome) -> Self {
        self.record_sample(
            outcome.ns_duration().unwrap_or(0),
            outcome.succeeded(),
            outcome.is_expired(),
        )
    }

    /// Returns these statistics with one execution of `ns_duration` folded in.
    #[must_use]
    pub fn record_sample(&self, ns_duration: i64, succeeded: bool, expired: bool) -> Self {
        let ns_duration = ns_duration.max(0);
        Self {
            duration_total_ns: self.duration_total_ns.saturating_add(ns_duration),
            executions_count: self.executions_count + 1,
            successful_executions_count: self.successful_executions_count + u64::from(succeeded),
            slow_executions_count: self.slow_executions_count + u64::from(expired),
            duration_min_ns: self.duration_min_ns.min(ns_duration),
            duration_max_ns: self.duration_max_ns.max(ns_duration),
            histogram_msec: self.histogram_msec.accumulate(ns_duration / NANOS_PER_MILLI),
        }
    }

    /// Sum of all execution durations in nanoseconds.
    pub fn duration_total_ns(&self) -> i64 {
        self.duration_total_ns
    }

    /// Number of recorded executions.
    pub fn executions_count(&self) -> u64 {
        self.executions_count
    }

    /// Number of executions that completed with `Ok`.
    pub fn successful_executions_count(&self) -> u64 {
        self.successful_executions_count
    }

    /// Number of executions that outlived their deadline.
    pub fn slow_executions_count(&self) -> u64 {
        self.slow_executions_count
    }

    /// Shortest execution; `i64::MAX` until something ran.
    pub fn duration_min_ns(&self) -> i64 {
        self.duration_min_ns
    }

    /// Longest execution in nanoseconds.
    pub fn duration_max_ns(&self) -> i64 {
        self.duration_max_ns
    }

    /// Histogram of execution times in whole milliseconds.
    pub fn histogram_msec(&self) -> &LogarithmicHistogram32 {
        &self.histogram_msec
    }

    /// Sum of all execution durations in milliseconds.
    pub fn total_msec(&self) -> i64 {
        self.duration_total_ns / NANOS_PER_MILLI
    }

    /// Shortest execution in milliseconds, `0` if nothing ran.
    pub fn min_msec(&self) -> i64 {
        if self.executions_count == 0 {
            0
        } else {
            self.duration_min_ns / NANOS_PER_MILLI
        }
    }

    /// Longest execution in milliseconds.
    pub fn max_msec(&self) -> i64 {
        self.duration_max_ns / NANOS_PER_MILLI
    }

    /// Mean execution time in milliseconds, `0.0` if nothing ran.
    pub fn average_msec(&self) -> f64 {
        if self.executions_count == 0 {
            return 0.0;
        }
        nanos_to_msec(self.duration_total_ns as f64 / self.executions_count as f64)
    }

    /// Mean execution time in milliseconds with the single slowest execution
    /// left out, `0.0` with fewer than two executions.
    pub fn average_msec_excluding_slowest(&self) -> f64 {
        if self.executions_count < 2 {
            return 0.0;
        }
        let remaining = (self.duration_total_ns - self.duration_max_ns) as f64;
        nanos_to_msec(remaining / (self.executions_count - 1) as f64)
    }

    /// Returns `true` if no execution has been recorded.
    pub fn is_unused(&self) -> bool {
        self.executions_count == 0
    }

    pub(crate) fn values(&self) -> Vec<String> {
        vec![
            self.total_msec().to_string(),
            self.executions_count.to_string(),
            self.successful_executions_count.to_string(),
            self.slow_executions_count.to_string(),
            self.min_msec().to_string(),
            self.max_msec().to_string(),
            format!("{:.3}", self.average_msec()),
            format!("{:.3}", self.average_msec_excluding_slowest()),
            format!("[{}]", self.histogram_msec),
        ]
    }
}

fn nanos_to_msec(nanos: f64) -> f64 {
    nanos / NANOS_PER_MILLI as f64
}

impl Display for TimedScopeStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "executions:{} successful:{} slow:{} total:{}ms min:{}ms max:{}ms avg:{:.3}ms",
            self.executions_count,
            self.successful_executions_count,
            self.slow_executions_count,
            self.total_msec(),
            self.min_msec(),
            self.max_msec(),
            self.average_msec()
        )
    }
}
