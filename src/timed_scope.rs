//! Deadline-supervised execution with aggregated timing statistics.
//!
//! A [`TimedScope`] wraps a task, measures it, folds the measurement into its
//! [`TimedScopeStatistics`] and raises [`ScopeAlert`]s when the task is slow
//! or fails. The deadline is observational only: the task always runs to
//! completion on the calling thread.
//!
//! ```text
//!                     ┌─────────── alarm fires ───────────┐
//!                     │                                   ▼
//!   execute ──► Running ──── Ok ────► Succeeded    Running ∧ Expired ──► TimedOut alert
//!                     │                                   │
//!                     └──── Err / panic ──► Failed        ├── Ok ──► SucceededSlowly alert
//!                                     (Failed alert)      └── Err ──► Failed alert
//! ```
//!
//! | Task result     | Deadline passed | Alerts                       |
//! |-----------------|-----------------|------------------------------|
//! | `Ok`            | no              | none                         |
//! | `Ok`            | yes             | `TimedOut`, `SucceededSlowly`|
//! | `Err` / panic   | no              | `Failed`                     |
//! | `Err` / panic   | yes             | `TimedOut`, `Failed`         |
//!
//! The second alert of an expired call is raised by whichever of the caller
//! and the alarm finishes last, so it never overtakes `TimedOut` and the
//! caller never waits for the alarm.

pub mod outcome;
pub mod statistics;

use std::fmt::{self, Debug, Display};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug_span, warn};

use crate::atomic_snapshot::AtomicSnapshot;
use crate::clock::Clock;
use crate::registry::Instrument;
use crate::scheduler::{panic_message, AlarmHandle, Scheduler};

pub use outcome::{AlertHandler, LoggingAlertHandler, NoAlerts, ScopeAlert, ScopeOutcome};
pub use statistics::TimedScopeStatistics;

/// A named, deadline-supervised execution wrapper.
///
/// # Examples
///
/// ```rust
/// use hedron_instrument::clock::MonotonicClock;
/// use hedron_instrument::scheduler::TimerScheduler;
/// use hedron_instrument::timed_scope::{NoAlerts, TimedScope};
/// use std::sync::Arc;
///
/// let scheduler = Arc::new(TimerScheduler::new().unwrap());
/// let scope = TimedScope::new("load_config", scheduler, Arc::new(MonotonicClock::new()));
///
/// let parsed: Result<u32, std::num::ParseIntError> = scope.execute(100, NoAlerts, || "42".parse());
/// assert_eq!(parsed, Ok(42));
///
/// let failed: Result<u32, _> = scope.execute(100, NoAlerts, || "x".parse::<u32>());
/// assert!(failed.is_err());
///
/// let stats = scope.statistics();
/// assert_eq!(stats.executions_count(), 2);
/// assert_eq!(stats.successful_executions_count(), 1);
/// ```
pub struct TimedScope {
    name: Arc<str>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    statistics: AtomicSnapshot<TimedScopeStatistics>,
    next_call: AtomicU64,
}

/// Point-in-time copy of a [`TimedScope`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimedScopeSnapshot {
    /// The name of the scope.
    pub name: String,
    /// Aggregated statistics.
    pub statistics: TimedScopeStatistics,
}

impl TimedScope {
    /// Creates a scope supervised by `scheduler` and timed by `clock`.
    pub fn new(name: &str, scheduler: Arc<dyn Scheduler>, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: Arc::from(name),
            scheduler,
            clock,
            statistics: AtomicSnapshot::default(),
            next_call: AtomicU64::new(0),
        }
    }

    /// Runs `task` under a deadline of `msec_limit` milliseconds.
    ///
    /// A limit of `0` disables the deadline. The task's result is returned
    /// unchanged after the statistics have been updated; a panic is recorded
    /// as a failure and then resumed.
    pub fn execute<T, E, F, H>(&self, msec_limit: u64, alert_handler: H, task: F) -> Result<T, E>
    where
        E: Display,
        F: FnOnce() -> Result<T, E>,
        H: AlertHandler + 'static,
    {
        let context_id = format!(
            "{}#{}",
            self.name,
            self.next_call.fetch_add(1, Ordering::Relaxed)
        );
        let span = debug_span!("timed_scope", scope = %self.name, context_id = %context_id);
        let _entered = span.enter();

        let alert_handler: Arc<dyn AlertHandler> = Arc::new(alert_handler);
        let outcome = Arc::new(ScopeOutcome::new(
            Arc::clone(&self.name),
            context_id,
            self.clock.time_in_nanoseconds(),
            msec_limit,
        ));

        let alarm = if msec_limit > 0 {
            self.arm_deadline(msec_limit, &outcome, &alert_handler)
        } else {
            None
        };

        let result = panic::catch_unwind(AssertUnwindSafe(task));

        let ns_finish = self.clock.time_in_nanoseconds();
        let expired = alarm.is_some_and(|handle| !handle.cancel());
        if expired {
            outcome.mark_expired(ns_finish);
        }

        let failure = match &result {
            Ok(Ok(_)) => None,
            Ok(Err(error)) => Some(error.to_string()),
            Err(payload) => Some(format!("panicked: {}", panic_message(payload.as_ref()))),
        };
        let succeeded = failure.is_none();
        outcome.complete((ns_finish - outcome.ns_start()).max(0), failure);
        self.statistics.update(|stats| stats.calculate(&outcome));

        if expired {
            if outcome.finish_side() {
                alert_handler.on_alert(outcome.closing_alert(), &outcome);
            }
        } else if !succeeded {
            alert_handler.on_alert(ScopeAlert::Failed, &outcome);
        }

        match result {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Runs an infallible `task` under a deadline of `msec_limit` milliseconds.
    pub fn run<T, F, H>(&self, msec_limit: u64, alert_handler: H, task: F) -> T
    where
        F: FnOnce() -> T,
        H: AlertHandler + 'static,
    {
        match self.execute(msec_limit, alert_handler, || {
            Ok::<T, std::convert::Infallible>(task())
        }) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Returns the current statistics.
    pub fn statistics(&self) -> Arc<TimedScopeStatistics> {
        self.statistics.load()
    }

    /// Returns the name of this scope.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn arm_deadline(
        &self,
        msec_limit: u64,
        outcome: &Arc<ScopeOutcome>,
        alert_handler: &Arc<dyn AlertHandler>,
    ) -> Option<AlarmHandle> {
        let outcome = Arc::clone(outcome);
        let alert_handler = Arc::clone(alert_handler);
        let clock = Arc::clone(&self.clock);

        let fired = move || {
            outcome.mark_expired(clock.time_in_nanoseconds());
            alert_handler.on_alert(ScopeAlert::TimedOut, &outcome);
            if outcome.finish_side() {
                alert_handler.on_alert(outcome.closing_alert(), &outcome);
            }
        };

        match self
            .scheduler
            .schedule_once(Duration::from_millis(msec_limit), Box::new(fired))
        {
            Ok(handle) => Some(handle),
            Err(error) => {
                warn!(%error, scope = %self.name, "deadline not armed, running unsupervised");
                None
            }
        }
    }
}

impl Instrument for TimedScope {
    type Snapshot = TimedScopeSnapshot;

    const KIND: &'static str = "TimedScope";
    const COLUMNS: &'static [&'static str] = statistics::COLUMNS;

    fn name(&self) -> &str {
        &self.name
    }

    fn is_unused(&self) -> bool {
        self.statistics.load().is_unused()
    }

    fn values(&self) -> Vec<String> {
        self.statistics.load().values()
    }

    fn reset(&self) {
        self.statistics.store(TimedScopeStatistics::default());
    }

    fn snapshot(&self) -> TimedScopeSnapshot {
        TimedScopeSnapshot {
            name: self.name.to_string(),
            statistics: (*self.statistics.load()).clone(),
        }
    }
}

impl Debug for TimedScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{ {} }}", self.name, self.statistics.load())
    }
}
