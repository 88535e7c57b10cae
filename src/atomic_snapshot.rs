//! Atomically replaced immutable state.
//!
//! Every instrument with more than one word of state keeps it in an
//! [`AtomicSnapshot`]: readers load the current `Arc` and never see a partial
//! update, writers compute a fresh value from the one they read and publish
//! it with a compare-and-swap, retrying if another writer got there first.
//!
//! ```text
//!   writer A: load ──► compute ──► CAS ✓
//!   writer B: load ──► compute ──────────► CAS ✗ ──► load ──► compute ──► CAS ✓
//!   reader:   load (always a complete snapshot)
//! ```

use std::fmt::{self, Debug};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::trace;

/// An immutable value of type `T` behind an atomically swapped pointer.
pub struct AtomicSnapshot<T> {
    current: ArcSwap<T>,
}

impl<T> AtomicSnapshot<T> {
    /// Creates a cell holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// Returns the current snapshot.
    #[inline]
    pub fn load(&self) -> Arc<T> {
        self.current.load_full()
    }

    /// Unconditionally replaces the current snapshot.
    pub fn store(&self, value: T) {
        self.current.store(Arc::new(value));
    }

    /// Replaces the snapshot with `next(current)` using an optimistic retry loop.
    ///
    /// `next` must be pure: under contention it runs once per attempt, each time
    /// against the snapshot that beat the previous attempt. Returns the snapshot
    /// that was installed.
    pub fn update<F>(&self, mut next: F) -> Arc<T>
    where
        F: FnMut(&T) -> T,
    {
        let mut current = self.current.load();
        loop {
            let candidate = Arc::new(next(&current));
            let previous = self.current.compare_and_swap(&*current, Arc::clone(&candidate));
            if Arc::ptr_eq(&*previous, &*current) {
                return candidate;
            }
            trace!("snapshot changed concurrently, retrying");
            current = previous;
        }
    }
}

impl<T: Default> Default for AtomicSnapshot<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Debug> Debug for AtomicSnapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&**self.current.load(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_update_returns_installed_value() {
        let cell = AtomicSnapshot::new(1u64);
        let installed = cell.update(|v| v + 1);
        assert_eq!(*installed, 2);
        assert_eq!(*cell.load(), 2);
    }

    #[test]
    fn test_store() {
        let cell = AtomicSnapshot::new(String::from("a"));
        cell.store(String::from("b"));
        assert_eq!(cell.load().as_str(), "b");
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let cell = Arc::new(AtomicSnapshot::new(Vec::<u32>::new()));
        let mut handles = vec![];

        for t in 0..8 {
            let cell = Arc::clone(&cell);
            handles.push(thread::spawn(move || {
                for i in 0..250 {
                    cell.update(|v| {
                        let mut next = v.clone();
                        next.push(t * 1000 + i);
                        next
                    });
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let mut values = (*cell.load()).clone();
        assert_eq!(values.len(), 2000);
        values.sort_unstable();
        values.dedup();
        assert_eq!(values.len(), 2000);
    }

    #[test]
    fn test_debug_shows_current_value() {
        let cell = AtomicSnapshot::new(42);
        assert_eq!(format!("{:?}", cell), "42");
    }
}
