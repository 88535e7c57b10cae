//! Named instrument registries and the summary callback registry.
//!
//! A [`Registry`] maps names to instruments of a single kind. Lookups create
//! the instrument on first use and return the same shared instance forever
//! after; entries are never removed, only reset in place.
//!
//! A [`SummaryRegistry`] collects "dump everything as text" callbacks so that
//! a single call can print every kind of instrument at once.

use std::fmt::{self, Debug};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

/// Common interface of every named instrument kind.
///
/// The reporting layer uses it to render a registry as CSV-like text or as a
/// table, and to take deep-copied snapshots for export.
pub trait Instrument: Debug + Send + Sync + 'static {
    /// Detached, immutable copy of an instrument's state.
    type Snapshot: Clone + Debug;

    /// Short kind name printed in report headers, e.g. `"Counter"`.
    const KIND: &'static str;

    /// Report columns after the leading name column.
    const COLUMNS: &'static [&'static str];

    /// Returns the registry name of this instrument.
    fn name(&self) -> &str;

    /// Returns `true` if nothing has been recorded since creation or the last reset.
    fn is_unused(&self) -> bool;

    /// Returns one rendered value per entry of [`COLUMNS`](Self::COLUMNS).
    fn values(&self) -> Vec<String>;

    /// Returns the instrument to its initial state.
    fn reset(&self);

    /// Copies the current state out of the instrument.
    fn snapshot(&self) -> Self::Snapshot;
}

/// A concurrent, append-only map from name to instrument.
///
/// # Examples
///
/// ```rust
/// use hedron_instrument::counters::Counter;
/// use hedron_instrument::registry::Registry;
///
/// let registry: Registry<Counter> = Registry::new();
/// let a = registry.get_or_create_with("requests", Counter::new);
/// let b = registry.get_or_create_with("requests", Counter::new);
/// a.increment();
/// assert_eq!(b.get(), 1);
/// assert_eq!(registry.len(), 1);
/// ```
pub struct Registry<I> {
    instruments: DashMap<String, Arc<I>>,
}

impl<I: Instrument> Registry<I> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            instruments: DashMap::new(),
        }
    }

    /// Returns the instrument registered under `name`, if any.
    pub fn get(&self, name: &str) -> Option<Arc<I>> {
        self.instruments.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the instrument registered under `name`, creating it with `make`
    /// if absent.
    ///
    /// Concurrent first lookups of the same name all receive the one instance
    /// that was inserted; `make` runs at most once per name.
    pub fn get_or_create_with<F>(&self, name: &str, make: F) -> Arc<I>
    where
        F: FnOnce(&str) -> I,
    {
        if let Some(existing) = self.get(name) {
            return existing;
        }
        match self.instruments.entry(name.to_owned()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                debug!(kind = I::KIND, name, "registering instrument");
                Arc::clone(entry.insert(Arc::new(make(name))).value())
            }
        }
    }

    /// Returns the number of registered instruments.
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// Returns `true` if nothing has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Returns every registered instrument, sorted by name.
    pub fn instruments(&self) -> Vec<Arc<I>> {
        let mut all: Vec<Arc<I>> = self
            .instruments
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Returns snapshots of the registered instruments, sorted by name.
    ///
    /// With `exclude_unused`, instruments that recorded nothing are skipped.
    pub fn snapshot_all(&self, exclude_unused: bool) -> Vec<I::Snapshot> {
        self.instruments()
            .iter()
            .filter(|i| !(exclude_unused && i.is_unused()))
            .map(|i| i.snapshot())
            .collect()
    }

    /// Resets every registered instrument in place.
    ///
    /// Registrations survive: later lookups return the same, now reset, instances.
    pub fn reset_all(&self) {
        for instrument in self.instruments() {
            instrument.reset();
        }
    }

    /// Renders a header line plus one line per instrument, sorted by name.
    ///
    /// ```text
    /// "Counter",count
    /// "errors",3
    /// "requests",1200
    /// ```
    pub fn format_results(&self, exclude_unused: bool) -> String {
        let mut out = String::new();
        write_row(&mut out, I::KIND, I::COLUMNS.iter().copied());
        for instrument in self.instruments() {
            if exclude_unused && instrument.is_unused() {
                continue;
            }
            out.push('\n');
            let values = instrument.values();
            write_row(&mut out, instrument.name(), values.iter().map(String::as_str));
        }
        out
    }
}

fn write_row<'a>(out: &mut String, name: &str, values: impl Iterator<Item = &'a str>) {
    out.push('"');
    out.push_str(&name.replace('"', "\"\""));
    out.push('"');
    for value in values {
        out.push(',');
        out.push_str(value);
    }
}

impl<I: Instrument> Default for Registry<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Instrument> Debug for Registry<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &I::KIND)
            .field("instruments", &self.instruments())
            .finish()
    }
}

/// Callback producing one block of summary text; the argument is `exclude_unused`.
pub type SummaryCallback = Box<dyn Fn(bool) -> String + Send + Sync>;

/// Ordered list of summary callbacks.
///
/// [`dump_all`](Self::dump_all) runs the callbacks in registration order and
/// joins their output with newlines.
#[derive(Default)]
pub struct SummaryRegistry {
    callbacks: RwLock<Vec<SummaryCallback>>,
}

impl SummaryRegistry {
    /// Creates an empty summary registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a callback to the end of the dump order.
    pub fn register_summary_data<F>(&self, callback: F)
    where
        F: Fn(bool) -> String + Send + Sync + 'static,
    {
        self.callbacks.write().push(Box::new(callback));
    }

    /// Runs every callback and joins the non-empty results with newlines.
    pub fn dump_all(&self, exclude_unused: bool) -> String {
        self.callbacks
            .read()
            .iter()
            .map(|callback| callback(exclude_unused))
            .filter(|block| !block.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Returns the number of registered callbacks.
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Returns `true` if no callback has been registered.
    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }
}

impl Debug for SummaryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummaryRegistry")
            .field("callbacks", &self.len())
            .finish()
    }
}
