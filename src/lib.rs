//! # Hedron Instrument - Lock-Free Application Instrumentation
//!
//! A Rust library of named, thread-safe instruments for measuring what a
//! service does: plain counters, gauges with a high-water mark, sparse per-key
//! counters, per-epoch throughput histograms and deadline-supervised timed
//! scopes with aggregated latency statistics.
//!
//! ## The Problem
//!
//! Instrumentation is written to from every thread of a service and read by a
//! reporter at arbitrary times. Guarding each instrument with a mutex makes
//! recording contend with reporting, and a reporter that reads several fields
//! one at a time can observe a half-applied update (a count that includes a
//! sample whose duration is not yet in the total).
//!
//! ## The Solution: Immutable Snapshots
//!
//! Single-word instruments ([`Counter`], [`MaxCounter`]) are plain atomics.
//! Everything else keeps its state as an **immutable value behind an
//! atomically swapped pointer**:
//!
//! 1. **Read**: load the current snapshot (an `Arc`, never a partial state).
//! 2. **Compute**: derive the next snapshot from it with a pure function.
//! 3. **Publish**: compare-and-swap the pointer; on conflict start over from
//!    the snapshot that won.
//!
//! No lock is held while computing, and readers always see some complete
//! prior state.
//!
//! ## Available Instruments
//!
//! | Type | Description | Use Case |
//! |------|-------------|----------|
//! | [`Counter`] | Monotonic event counter | Request totals, cache hits |
//! | [`MaxCounter`] | Up/down gauge with high-water mark | In-flight requests, queue depth |
//! | [`CounterRange`] | Sorted `key -> delta` counter | Response codes, batch sizes |
//! | [`CounterThroughput`] | Events-per-epoch histogram | Throughput including idle periods |
//! | [`TimedScope`] | Deadline-supervised execution | Latency statistics and slow/failed alerts |
//!
//! ## Quick Start
//!
//! ```rust
//! use hedron_instrument::instrumentation::Instrumentation;
//! use hedron_instrument::timed_scope::LoggingAlertHandler;
//! use std::time::Duration;
//!
//! let instruments = Instrumentation::new().unwrap();
//!
//! instruments.counter("requests").increment();
//! instruments.counter_range("status").increment(200);
//! instruments
//!     .counter_throughput("orders", Duration::from_secs(1))
//!     .increment();
//!
//! let body: Result<String, std::io::Error> = instruments
//!     .timed_scope("fetch")
//!     .execute(250, LoggingAlertHandler, || Ok("payload".to_string()));
//! assert!(body.is_ok());
//!
//! // CSV-like summary of every instrument that recorded something.
//! println!("{}", instruments.dump_all(true));
//! ```
//!
//! ## Timed Scopes
//!
//! [`TimedScope::execute`] runs a task on the calling thread while a shared
//! scheduler watches its deadline. The deadline never interrupts the task; it
//! only raises [`ScopeAlert`]s:
//!
//! - `TimedOut` as soon as the deadline passes,
//! - `SucceededSlowly` when a task that timed out eventually succeeds,
//! - `Failed` whenever the task returns an error or panics.
//!
//! The task's own `Result` is returned unchanged.
//!
//! ## Observers
//!
//! Every registry renders itself as CSV-like text through
//! [`Instrumentation::dump_all`]. Optional observers add richer formats:
//!
//! | Feature | Module | Description |
//! |---------|--------|-------------|
//! | `table` | [`observers::table`] | Pretty-print registries as tables |
//! | `json` | [`observers::json`] | Serialize a context snapshot to JSON |
//! | `serde` | [`snapshot`] | Serializable snapshots of every instrument |
//! | `full` | All observers | Enables all observer modules |
//!
//! ### Example: Table Output
//!
//! ```toml
//! [dependencies]
//! hedron-instrument = { version = "0.3", features = ["table"] }
//! ```
//!
//! ```rust,ignore
//! use hedron_instrument::observers::table::TableObserver;
//!
//! println!("{}", TableObserver::new().render_all(&instruments, true));
//! ```
//!
//! ## Logging
//!
//! The crate logs through `tracing`: instrument registration at `debug`,
//! snapshot retries under contention at `trace`, and each timed scope
//! execution inside a `timed_scope` span carrying its context id.

pub mod atomic_snapshot;
pub mod clock;
pub mod counters;
pub mod error;
pub mod histogram;
pub mod instrumentation;
pub mod observers;
pub mod registry;
pub mod scheduler;
pub mod timed_scope;

#[cfg(feature = "serde")]
pub mod snapshot;

pub use counters::{Counter, CounterRange, CounterThroughput, MaxCounter};
pub use error::SchedulerError;
pub use histogram::{LogarithmicHistogram, LogarithmicHistogram32, LogarithmicHistogram64};
pub use instrumentation::{Instrumentation, InstrumentationBuilder};
pub use timed_scope::{ScopeAlert, TimedScope, TimedScopeStatistics};
