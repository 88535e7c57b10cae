//! Error types of the crate.
//!
//! Instruments themselves never fail; the only fallible piece is the alarm
//! scheduler that supervises [`TimedScope`](crate::timed_scope::TimedScope)
//! deadlines. Errors raised by tasks wrapped in a timed scope are returned to
//! the caller untouched and never converted into these types.

use thiserror::Error;

/// Error raised by a [`Scheduler`](crate::scheduler::Scheduler).
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The scheduler has been shut down and accepts no new alarms.
    #[error("scheduler has been shut down")]
    ShutDown,

    /// A scheduler thread could not be spawned.
    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;
