//! The instrumentation context: every registry, the deadline scheduler and
//! the clock in one explicitly passed object.
//!
//! Instead of process-wide statics, an application builds one
//! [`Instrumentation`] at startup and hands it (usually as an `Arc`) to the
//! code that records measurements. Looking up an instrument by name creates
//! it on first use and returns the same instance afterwards.
//!
//! # Examples
//!
//! ```rust
//! use hedron_instrument::instrumentation::Instrumentation;
//! use hedron_instrument::timed_scope::NoAlerts;
//!
//! let instruments = Instrumentation::new().unwrap();
//!
//! instruments.counter("requests").increment();
//! instruments.max_counter("in_flight").increment();
//! instruments.counter_range("status").increment(200);
//! instruments.timed_scope("handler").run(0, NoAlerts, || ());
//!
//! let report = instruments.dump_all(true);
//! assert!(report.contains("\"requests\",1"));
//! assert!(report.contains("\"status\",[200:1]"));
//! ```

use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, MonotonicClock};
use crate::counters::{Counter, CounterRange, CounterThroughput, MaxCounter};
use crate::error::Result;
use crate::registry::{Registry, SummaryRegistry};
use crate::scheduler::{Scheduler, SchedulerConfig, TimerScheduler};
use crate::timed_scope::TimedScope;

/// Owns the five instrument registries and their shared collaborators.
pub struct Instrumentation {
    counters: Arc<Registry<Counter>>,
    max_counters: Arc<Registry<MaxCounter>>,
    counter_ranges: Arc<Registry<CounterRange>>,
    throughputs: Arc<Registry<CounterThroughput>>,
    timed_scopes: Arc<Registry<TimedScope>>,
    summaries: SummaryRegistry,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
}

/// Builder for [`Instrumentation`].
///
/// Without an explicit scheduler a [`TimerScheduler`] is started from the
/// configured [`SchedulerConfig`]; without an explicit clock a
/// [`MonotonicClock`] is used.
#[derive(Default)]
pub struct InstrumentationBuilder {
    scheduler: Option<Arc<dyn Scheduler>>,
    clock: Option<Arc<dyn Clock>>,
    scheduler_config: SchedulerConfig,
}

impl InstrumentationBuilder {
    /// Uses `scheduler` for timed scope deadlines.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Uses `clock` for throughput epochs and timed scope durations.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Configures the default scheduler. Ignored when a scheduler is set.
    pub fn scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler_config = config;
        self
    }

    /// Builds the context, starting the default scheduler if needed.
    pub fn build(self) -> Result<Instrumentation> {
        let scheduler: Arc<dyn Scheduler> = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(TimerScheduler::with_config(self.scheduler_config)?),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(MonotonicClock::new()),
        };

        let instrumentation = Instrumentation {
            counters: Arc::default(),
            max_counters: Arc::default(),
            counter_ranges: Arc::default(),
            throughputs: Arc::default(),
            timed_scopes: Arc::default(),
            summaries: SummaryRegistry::new(),
            scheduler,
            clock,
        };
        instrumentation.register_builtin_summaries();
        Ok(instrumentation)
    }
}

impl Debug for InstrumentationBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentationBuilder")
            .field("scheduler", &self.scheduler)
            .field("clock", &self.clock)
            .field("scheduler_config", &self.scheduler_config)
            .finish()
    }
}

impl Instrumentation {
    /// Returns a builder.
    pub fn builder() -> InstrumentationBuilder {
        InstrumentationBuilder::default()
    }

    /// Builds a context with a default [`TimerScheduler`] and [`MonotonicClock`].
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    fn register_builtin_summaries(&self) {
        let counters = Arc::clone(&self.counters);
        self.register_summary_data(move |exclude_unused| counters.format_results(exclude_unused));
        let max_counters = Arc::clone(&self.max_counters);
        self.register_summary_data(move |exclude_unused| {
            max_counters.format_results(exclude_unused)
        });
        let counter_ranges = Arc::clone(&self.counter_ranges);
        self.register_summary_data(move |exclude_unused| {
            counter_ranges.format_results(exclude_unused)
        });
        let throughputs = Arc::clone(&self.throughputs);
        self.register_summary_data(move |exclude_unused| {
            throughputs.format_results(exclude_unused)
        });
        let timed_scopes = Arc::clone(&self.timed_scopes);
        self.register_summary_data(move |exclude_unused| {
            timed_scopes.format_results(exclude_unused)
        });
    }

    /// Returns the counter called `name`, creating it on first use.
    pub fn counter(&self, name: &str) -> Arc<Counter> {
        self.counters.get_or_create_with(name, Counter::new)
    }

    /// Returns the max counter called `name`, creating it on first use.
    pub fn max_counter(&self, name: &str) -> Arc<MaxCounter> {
        self.max_counters.get_or_create_with(name, MaxCounter::new)
    }

    /// Returns the range counter called `name`, creating it on first use.
    pub fn counter_range(&self, name: &str) -> Arc<CounterRange> {
        self.counter_ranges.get_or_create_with(name, CounterRange::new)
    }

    /// Returns the throughput counter called `name`, creating it on first use.
    ///
    /// `resolution` only takes effect when the counter is created; later
    /// lookups return the existing counter with its original resolution.
    pub fn counter_throughput(&self, name: &str, resolution: Duration) -> Arc<CounterThroughput> {
        self.throughputs.get_or_create_with(name, |name| {
            CounterThroughput::new(name, resolution, Arc::clone(&self.clock))
        })
    }

    /// Returns the timed scope called `name`, creating it on first use.
    pub fn timed_scope(&self, name: &str) -> Arc<TimedScope> {
        self.timed_scopes.get_or_create_with(name, |name| {
            TimedScope::new(name, Arc::clone(&self.scheduler), Arc::clone(&self.clock))
        })
    }

    /// The registry of [`Counter`]s.
    pub fn counters(&self) -> &Registry<Counter> {
        &self.counters
    }

    /// The registry of [`MaxCounter`]s.
    pub fn max_counters(&self) -> &Registry<MaxCounter> {
        &self.max_counters
    }

    /// The registry of [`CounterRange`]s.
    pub fn counter_ranges(&self) -> &Registry<CounterRange> {
        &self.counter_ranges
    }

    /// The registry of [`CounterThroughput`]s.
    pub fn throughputs(&self) -> &Registry<CounterThroughput> {
        &self.throughputs
    }

    /// The registry of [`TimedScope`]s.
    pub fn timed_scopes(&self) -> &Registry<TimedScope> {
        &self.timed_scopes
    }

    /// The clock shared by every instrument of this context.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The scheduler supervising timed scope deadlines.
    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    /// Resets every instrument of every kind. Registered names stay registered.
    pub fn reset_all(&self) {
        self.counters.reset_all();
        self.max_counters.reset_all();
        self.counter_ranges.reset_all();
        self.throughputs.reset_all();
        self.timed_scopes.reset_all();
    }

    /// Adds a block to [`dump_all`](Self::dump_all).
    ///
    /// The callback receives the `exclude_unused` flag and returns the text
    /// to include, or an empty string to contribute nothing.
    pub fn register_summary_data<F>(&self, callback: F)
    where
        F: Fn(bool) -> String + Send + Sync + 'static,
    {
        self.summaries.register_summary_data(callback);
    }

    /// Renders every registered summary block, newline-separated.
    pub fn dump_all(&self, exclude_unused: bool) -> String {
        self.summaries.dump_all(exclude_unused)
    }

    /// Takes a deep copy of every instrument.
    #[cfg(feature = "serde")]
    pub fn snapshot(&self, exclude_unused: bool) -> crate::snapshot::MetricsSnapshot {
        crate::snapshot::MetricsSnapshot {
            timestamp_ms: None,
            counters: self.counters.snapshot_all(exclude_unused),
            max_counters: self.max_counters.snapshot_all(exclude_unused),
            counter_ranges: self.counter_ranges.snapshot_all(exclude_unused),
            throughputs: self.throughputs.snapshot_all(exclude_unused),
            timed_scopes: self.timed_scopes.snapshot_all(exclude_unused),
        }
    }
}

impl Debug for Instrumentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumentation")
            .field("counters", &self.counters.len())
            .field("max_counters", &self.max_counters.len())
            .field("counter_ranges", &self.counter_ranges.len())
            .field("throughputs", &self.throughputs.len())
            .field("timed_scopes", &self.timed_scopes.len())
            .field("summaries", &self.summaries.len())
            .field("scheduler", &self.scheduler)
            .field("clock", &self.clock)
            .finish()
    }
}
