//! Per-epoch event counter with a throughput histogram.
//!
//! This module provides [`CounterThroughput`]. Time is cut into fixed-length
//! epochs (`resolution` wide). Events are counted within the open epoch; when
//! an event arrives in a later epoch, the finished epoch's count is folded into
//! a [`LogarithmicHistogram32`], together with one zero sample for every epoch
//! that passed without any event.
//!
//! ```text
//!   time ─►   |  e0  |  e1  |  e2  |  e3  |  e4  |  e5  |
//!   events     ● ●                                  ●
//!   folded     2      0      0      0      0       (open)
//! ```

use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use crate::atomic_snapshot::AtomicSnapshot;
use crate::clock::Clock;
use crate::histogram::LogarithmicHistogram32;
use crate::registry::Instrument;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct EpochState {
    // None until the first event opens an epoch.
    start_epoch_msec: Option<i64>,
    count_for_epoch: u64,
    histogram: LogarithmicHistogram32,
}

impl EpochState {
    fn record(&self, epoch_start_msec: i64, resolution_msec: i64) -> Self {
        match self.start_epoch_msec {
            // Same epoch, or a clock that stepped backwards: keep counting.
            Some(start) if epoch_start_msec <= start => Self {
                start_epoch_msec: Some(start),
                count_for_epoch: self.count_for_epoch.saturating_add(1),
                histogram: self.histogram.clone(),
            },
            Some(start) => {
                let skipped = (epoch_start_msec - start) / resolution_msec - 1;
                let histogram = self
                    .histogram
                    .accumulate(self.count_for_epoch)
                    .accumulate_n(0, u64::try_from(skipped).unwrap_or(0));
                Self {
                    start_epoch_msec: Some(epoch_start_msec),
                    count_for_epoch: 1,
                    histogram,
                }
            }
            None => Self {
                start_epoch_msec: Some(epoch_start_msec),
                count_for_epoch: 1,
                histogram: self.histogram.clone(),
            },
        }
    }
}

/// A named per-epoch event counter.
///
/// The histogram describes "how many events per epoch", one sample per
/// completed epoch, idle epochs included. The open epoch is not part of the
/// histogram until a later event closes it.
///
/// # Examples
///
/// ```rust
/// use hedron_instrument::clock::ManualClock;
/// use hedron_instrument::counters::CounterThroughput;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = Arc::new(ManualClock::new(0));
/// let throughput = CounterThroughput::new("orders", Duration::from_secs(1), clock.clone());
///
/// throughput.increment();
/// throughput.increment();
/// clock.set_milliseconds(3_000);
/// throughput.increment();
///
/// // One epoch with 2 events, two idle epochs, one open epoch.
/// let histogram = throughput.histogram();
/// assert_eq!(histogram.total_count(), 3);
/// assert_eq!(histogram.bin(0), 2);
/// assert_eq!(histogram.bin(1), 1);
/// ```
pub struct CounterThroughput {
    name: String,
    resolution_msec: i64,
    clock: Arc<dyn Clock>,
    state: AtomicSnapshot<EpochState>,
}

/// Point-in-time copy of a [`CounterThroughput`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CounterThroughputSnapshot {
    /// The name of the counter.
    pub name: String,
    /// Epoch width in milliseconds.
    pub resolution_msec: i64,
    /// Start of the open epoch, if any event has been recorded.
    pub start_epoch_msec: Option<i64>,
    /// Events in the open epoch.
    pub count_for_epoch: u64,
    /// Events-per-epoch histogram of the completed epochs.
    pub histogram: LogarithmicHistogram32,
}

impl CounterThroughput {
    /// Creates a counter with epochs `resolution` wide, timed by `clock`.
    ///
    /// Resolutions below one millisecond are rounded up to one millisecond.
    pub fn new(name: &str, resolution: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.to_owned(),
            resolution_msec: i64::try_from(resolution.as_millis())
                .unwrap_or(i64::MAX)
                .max(1),
            clock,
            state: AtomicSnapshot::default(),
        }
    }

    /// Records one event in the current epoch.
    pub fn increment(&self) {
        let now_msec = self.clock.time_in_milliseconds();
        let epoch_start_msec = now_msec.div_euclid(self.resolution_msec) * self.resolution_msec;
        let resolution_msec = self.resolution_msec;
        self.state
            .update(|state| state.record(epoch_start_msec, resolution_msec));
    }

    /// Returns the histogram of completed epochs.
    pub fn histogram(&self) -> LogarithmicHistogram32 {
        self.state.load().histogram.clone()
    }

    /// Returns `(epoch start in msec, events so far)` for the open epoch.
    pub fn current_epoch(&self) -> Option<(i64, u64)> {
        let state = self.state.load();
        state
            .start_epoch_msec
            .map(|start| (start, state.count_for_epoch))
    }

    /// Returns the epoch width.
    pub fn resolution(&self) -> Duration {
        Duration::from_millis(u64::try_from(self.resolution_msec).unwrap_or(u64::MAX))
    }

    /// Returns the name of this counter.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Instrument for CounterThroughput {
    type Snapshot = CounterThroughputSnapshot;

    const KIND: &'static str = "CounterThroughput";
    const COLUMNS: &'static [&'static str] = &["histogram"];

    fn name(&self) -> &str {
        &self.name
    }

    /// The open epoch does not count until it has been folded.
    fn is_unused(&self) -> bool {
        self.state.load().histogram.is_unused()
    }

    fn values(&self) -> Vec<String> {
        vec![format!("[{}]", self.state.load().histogram)]
    }

    fn reset(&self) {
        self.state.store(EpochState::default());
    }

    fn snapshot(&self) -> CounterThroughputSnapshot {
        let state = self.state.load();
        CounterThroughputSnapshot {
            name: self.name.clone(),
            resolution_msec: self.resolution_msec,
            start_epoch_msec: state.start_epoch_msec,
            count_for_epoch: state.count_for_epoch,
            histogram: state.histogram.clone(),
        }
    }
}

impl Debug for CounterThroughput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.load();
        write!(
            f,
            "{}{{ resolution:{}ms open:{:?}/{} histogram:[{}] }}",
            self.name,
            self.resolution_msec,
            state.start_epoch_msec,
            state.count_for_epoch,
            state.histogram
        )
    }
}
