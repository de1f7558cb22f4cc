//! Per-document advisory locks. Every read-mutate-write cycle on a document
//! runs under the lock for its resolved path, so two mutations in the same
//! process can't interleave on one file. Writers in other processes are not
//! covered; for those the optimistic check in
//! [`crate::content::ContentRepository::update_if_unmodified`] applies.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct PathLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    pub fn new() -> PathLocks {
        PathLocks::default()
    }

    /// Runs `f` while holding the lock for `path`.
    pub fn with_lock<T, F: FnOnce() -> T>(&self, path: &Path, f: F) -> T {
        let lock = self.entry(path);
        let result = {
            let _guard = relock(&lock);
            f()
        };
        drop(lock);
        self.release(path);
        result
    }

    /// The number of paths with a live lock entry.
    pub fn len(&self) -> usize {
        relock(&self.locks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, path: &Path) -> Arc<Mutex<()>> {
        relock(&self.locks)
            .entry(path.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // Drops the map entry once nobody else holds or waits on it.
    fn release(&self, path: &Path) {
        let mut locks = relock(&self.locks);
        if let Some(lock) = locks.get(path) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(path);
            }
        }
    }
}

// A panic while holding a lock leaves nothing half-updated in memory (the
// guarded state is `()` or the map itself), so poisoning is ignored.
fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
