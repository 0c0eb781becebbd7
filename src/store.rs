//! Grow-only value store.
//!
//! Every node owns exactly one [`ValueStore`]: the set of all values it has
//! learned, locally submitted or received from peers. The set is monotonic:
//! values are only ever added, never removed, so any snapshot is a subset of
//! every later snapshot.

use std::collections::HashSet;

use parking_lot::RwLock;

/// Result of a single-value insert.
///
/// `total` is read under the same exclusive lock as the insert itself, so it
/// is exactly the set size the moment this insert completed; no concurrent
/// insert can interleave between the two. The gossip fan-out advertises this
/// value as the sender's known count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    /// Whether the value was newly added (false = already present, no-op).
    pub added: bool,
    /// Set size immediately after the operation.
    pub total: usize,
}

/// Result of a bulk merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// How many of the merged values were not previously present.
    pub added: usize,
    /// Set size immediately after the operation.
    pub total: usize,
}

/// Concurrency-safe grow-only set of values.
///
/// All operations are total: there are no error conditions. Writers take an
/// exclusive lock, readers a shared one; no lock is ever held across an
/// `.await` or handed to a caller.
#[derive(Debug, Default)]
pub struct ValueStore {
    values: RwLock<HashSet<u64>>,
}

impl ValueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `value` has been inserted before this call returned.
    pub fn contains(&self, value: u64) -> bool {
        self.values.read().contains(&value)
    }

    /// Insert `value` if absent.
    ///
    /// Idempotent: inserting a present value is a no-op and reports
    /// `added: false`. The returned `total` is atomic with the insert.
    pub fn insert(&self, value: u64) -> InsertOutcome {
        let mut values = self.values.write();
        let added = values.insert(value);
        InsertOutcome {
            added,
            total: values.len(),
        }
    }

    /// Insert every value in `incoming`, all under one exclusive section.
    ///
    /// Used by read-repair to merge a peer's snapshot. Per-value inserts are
    /// independently idempotent; order is irrelevant.
    pub fn merge<T: IntoIterator<Item = u64>>(&self, incoming: T) -> MergeOutcome {
        let mut values = self.values.write();
        let mut added = 0;
        for value in incoming {
            if values.insert(value) {
                added += 1;
            }
        }
        MergeOutcome {
            added,
            total: values.len(),
        }
    }

    /// A copy of the current value set, in arbitrary order.
    ///
    /// The copy does not alias internal storage: callers iterate it without
    /// holding any lock and never observe a torn state.
    pub fn snapshot(&self) -> Vec<u64> {
        self.values.read().iter().copied().collect()
    }

    /// Current set size.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn test_insert_reports_new_and_duplicate() {
        let store = ValueStore::new();
        let first = store.insert(7);
        assert!(first.added);
        assert_eq!(first.total, 1);

        let second = store.insert(7);
        assert!(!second.added);
        assert_eq!(second.total, 1);

        assert!(store.contains(7));
        assert!(!store.contains(8));
    }

    #[test]
    fn test_insert_is_idempotent() {
        let store = ValueStore::new();
        store.insert(1);
        store.insert(2);
        let before = {
            let mut s = store.snapshot();
            s.sort_unstable();
            s
        };
        for _ in 0..10 {
            let outcome = store.insert(1);
            assert!(!outcome.added);
        }
        let mut after = store.snapshot();
        after.sort_unstable();
        assert_eq!(before, after);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_snapshot_does_not_alias() {
        let store = ValueStore::new();
        store.insert(1);
        let snap = store.snapshot();
        store.insert(2);
        assert_eq!(snap.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_merge_counts_new_values_only() {
        let store = ValueStore::new();
        store.insert(1);
        store.insert(2);

        let outcome = store.merge([2, 3, 4]);
        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.total, 4);

        let outcome = store.merge([1, 2]);
        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.total, 4);
    }

    #[test]
    fn test_merge_empty_is_noop() {
        let store = ValueStore::new();
        store.insert(9);
        let outcome = store.merge(std::iter::empty());
        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.total, 1);
    }

    #[test]
    fn test_concurrent_inserts_add_each_value_once() {
        let store = Arc::new(ValueStore::new());
        let newly_added = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            let newly_added = Arc::clone(&newly_added);
            handles.push(std::thread::spawn(move || {
                for value in 0..100u64 {
                    let outcome = store.insert(value);
                    if outcome.added {
                        newly_added.fetch_add(1, Ordering::Relaxed);
                    }
                    // total is read under the insert's lock, so it can never
                    // exceed the number of distinct values in play
                    assert!(outcome.total <= 100);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 100);
        assert_eq!(newly_added.load(Ordering::Relaxed), 100);
    }
}
