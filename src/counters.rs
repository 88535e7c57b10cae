//! Named counter instruments.
//!
//! Four counter kinds cover the common "how many / how high / how spread /
//! how fast" questions about a running process:
//!
//! | Type | State | Typical use |
//! |------|-------|-------------|
//! | [`Counter`] | one atomic `i64` | calls, events, bytes |
//! | [`MaxCounter`] | atomic value + atomic high-water mark | in-flight requests, queue depth |
//! | [`CounterRange`] | immutable sorted `key -> delta` snapshot | counts per status code or batch size |
//! | [`CounterThroughput`] | immutable epoch + histogram snapshot | events per time slice |
//!
//! # Update model
//!
//! Single-word counters update their atomics directly. Multi-word counters
//! keep an immutable snapshot in an [`AtomicSnapshot`](crate::atomic_snapshot::AtomicSnapshot)
//! and replace it with an optimistic compare-and-swap loop:
//!
//! ```text
//!   ┌──────────────┐   load    ┌──────────────┐  compute  ┌──────────────┐
//!   │ ArcSwap<S>   │ ────────► │  snapshot S  │ ────────► │ snapshot S'  │
//!   └──────────────┘           └──────────────┘           └──────────────┘
//!          ▲                                                     │
//!          └──────────── CAS(S -> S'), retry on conflict ────────┘
//! ```
//!
//! No lock is held while a new snapshot is computed and readers always see a
//! complete snapshot.
//!
//! All counters implement [`Instrument`](crate::registry::Instrument), so they
//! can live in a [`Registry`](crate::registry::Registry) and be reported together.

pub mod counter;
pub mod max_counter;
pub mod range;
pub mod throughput;

pub use counter::{Counter, CounterSnapshot};
pub use max_counter::{MaxCounter, MaxCounterSnapshot};
pub use range::{CounterRange, CounterRangeSnapshot, RangeEntry};
pub use throughput::{CounterThroughput, CounterThroughputSnapshot};
