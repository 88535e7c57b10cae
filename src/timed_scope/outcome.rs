//! Per-execution outcome records and alert delivery.

use std::fmt::{self, Debug, Display};
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::{error, warn};

use crate::clock::NANOS_PER_MILLI;

/// Notification kinds delivered to an [`AlertHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScopeAlert {
    /// The deadline passed while the task was still running.
    TimedOut,
    /// The task succeeded, but only after its deadline had passed.
    SucceededSlowly,
    /// The task returned an error or panicked.
    Failed,
}

impl Display for ScopeAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScopeAlert::TimedOut => "timed out",
            ScopeAlert::SucceededSlowly => "succeeded slowly",
            ScopeAlert::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone)]
struct Completion {
    ns_duration: i64,
    failure: Option<String>,
}

const NOT_EXPIRED: i64 = -1;

/// The record of one [`TimedScope`](super::TimedScope) execution.
///
/// An outcome is shared between the calling thread and the deadline alarm,
/// so everything that changes after creation is set at most once: expiry by
/// [`mark_expired`](Self::mark_expired) and completion when the task returns.
/// A `TimedOut` alert therefore sees an outcome that is expired but not yet
/// complete.
pub struct ScopeOutcome {
    name: Arc<str>,
    context_id: String,
    ns_start: i64,
    msec_limit: u64,
    expired_msec: AtomicI64,
    completion: OnceLock<Completion>,
    // Sides of an expired execution (alarm, caller) done with their part.
    sides_done: AtomicU8,
}

impl ScopeOutcome {
    pub(crate) fn new(name: Arc<str>, context_id: String, ns_start: i64, msec_limit: u64) -> Self {
        Self {
            name,
            context_id,
            ns_start,
            msec_limit,
            expired_msec: AtomicI64::new(NOT_EXPIRED),
            completion: OnceLock::new(),
            sides_done: AtomicU8::new(0),
        }
    }

    /// Name of the scope that produced this outcome.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Per-call correlation id, unique within the scope.
    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    /// Clock reading at the start of the execution, in nanoseconds.
    pub fn ns_start(&self) -> i64 {
        self.ns_start
    }

    /// Deadline in milliseconds; `0` means unsupervised.
    pub fn msec_limit(&self) -> u64 {
        self.msec_limit
    }

    /// Returns `true` once the deadline has been observed to pass.
    pub fn is_expired(&self) -> bool {
        self.expired_msec.load(Ordering::Acquire) != NOT_EXPIRED
    }

    /// Milliseconds from start to the moment expiry was recorded.
    pub fn expired_msec(&self) -> Option<i64> {
        match self.expired_msec.load(Ordering::Acquire) {
            NOT_EXPIRED => None,
            msec => Some(msec),
        }
    }

    /// Returns `true` once the task has returned (or panicked).
    pub fn is_complete(&self) -> bool {
        self.completion.get().is_some()
    }

    /// Duration of the execution, once complete.
    pub fn ns_duration(&self) -> Option<i64> {
        self.completion.get().map(|completion| completion.ns_duration)
    }

    /// Returns `true` if the task completed with `Ok`.
    pub fn succeeded(&self) -> bool {
        self.completion
            .get()
            .is_some_and(|completion| completion.failure.is_none())
    }

    /// Rendered error (or panic message) of a failed task.
    pub fn failure(&self) -> Option<&str> {
        self.completion
            .get()
            .and_then(|completion| completion.failure.as_deref())
    }

    /// Records expiry at `now_ns`. Only the first call has an effect.
    pub(crate) fn mark_expired(&self, now_ns: i64) -> bool {
        let msec = (now_ns - self.ns_start).max(0) / NANOS_PER_MILLI;
        self.expired_msec
            .compare_exchange(NOT_EXPIRED, msec, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn complete(&self, ns_duration: i64, failure: Option<String>) {
        let _ = self.completion.set(Completion {
            ns_duration,
            failure,
        });
    }

    /// Marks one side of an expired execution as done: the alarm after its
    /// `TimedOut` alert, the caller after completing the outcome. Returns
    /// `true` for the second side, which delivers the closing alert.
    pub(crate) fn finish_side(&self) -> bool {
        self.sides_done.fetch_add(1, Ordering::AcqRel) == 1
    }

    /// The alert closing an expired execution.
    pub(crate) fn closing_alert(&self) -> ScopeAlert {
        if self.succeeded() {
            ScopeAlert::SucceededSlowly
        } else {
            ScopeAlert::Failed
        }
    }
}

impl Debug for ScopeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeOutcome")
            .field("name", &self.name())
            .field("context_id", &self.context_id)
            .field("ns_start", &self.ns_start)
            .field("msec_limit", &self.msec_limit)
            .field("expired_msec", &self.expired_msec())
            .field("ns_duration", &self.ns_duration())
            .field("failure", &self.failure())
            .finish()
    }
}

/// Receives [`ScopeAlert`]s from timed scopes.
///
/// `TimedOut` is delivered on a scheduler thread and `Failed` for a call
/// that met its deadline on the thread that ran the task. The alert closing
/// an expired call always follows its `TimedOut` and is delivered by
/// whichever of the two threads finishes last, so it may arrive after
/// [`execute`](super::TimedScope::execute) has returned. Any
/// `Fn(ScopeAlert, &ScopeOutcome)` closure is a handler.
pub trait AlertHandler: Send + Sync {
    /// Called once per alert.
    fn on_alert(&self, alert: ScopeAlert, outcome: &ScopeOutcome);
}

impl<F> AlertHandler for F
where
    F: Fn(ScopeAlert, &ScopeOutcome) + Send + Sync,
{
    fn on_alert(&self, alert: ScopeAlert, outcome: &ScopeOutcome) {
        self(alert, outcome)
    }
}

/// Logs every alert through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingAlertHandler;

impl AlertHandler for LoggingAlertHandler {
    fn on_alert(&self, alert: ScopeAlert, outcome: &ScopeOutcome) {
        match alert {
            ScopeAlert::TimedOut => warn!(
                scope = outcome.name(),
                context_id = outcome.context_id(),
                msec_limit = outcome.msec_limit(),
                "timed scope exceeded its deadline"
            ),
            ScopeAlert::SucceededSlowly => warn!(
                scope = outcome.name(),
                context_id = outcome.context_id(),
                msec_limit = outcome.msec_limit(),
                msec = outcome.ns_duration().unwrap_or(0) / NANOS_PER_MILLI,
                "timed scope succeeded after its deadline"
            ),
            ScopeAlert::Failed => error!(
                scope = outcome.name(),
                context_id = outcome.context_id(),
                error = outcome.failure().unwrap_or(""),
                "timed scope failed"
            ),
        }
    }
}

/// Ignores every alert.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAlerts;

impl AlertHandler for NoAlerts {
    fn on_alert(&self, _alert: ScopeAlert, _outcome: &ScopeOutcome) {}
}
