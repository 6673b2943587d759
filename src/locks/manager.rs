//! Path lock manager
//!
//! One fair reader/writer lock per path, created on demand and dropped once
//! nobody holds or waits for it. A request names every path it touches in a
//! [`LockSet`]; ancestors are added as shared so a directory cannot be moved
//! or deleted underneath an in-flight request. The whole set is acquired in
//! sorted path order, which rules out lock-order deadlocks.

use log::debug;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::error::NfsError;
use crate::namespace::NsPath;

type LockTable = Arc<Mutex<HashMap<NsPath, Arc<RwLock<()>>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Paths a request will touch, each with the strongest mode it needs.
#[derive(Debug, Default, Clone)]
pub struct LockSet {
    entries: BTreeMap<NsPath, LockMode>,
}

impl LockSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(mut self, path: &NsPath) -> Self {
        self.add(path, LockMode::Shared);
        self
    }

    pub fn exclusive(mut self, path: &NsPath) -> Self {
        self.add(path, LockMode::Exclusive);
        self
    }

    fn add(&mut self, path: &NsPath, mode: LockMode) {
        for ancestor in path.ancestors() {
            self.upgrade(ancestor, LockMode::Shared);
        }
        // The root is never renamed or removed, so it needs no lock
        if !path.is_root() {
            self.upgrade(path.clone(), mode);
        }
    }

    fn upgrade(&mut self, path: NsPath, mode: LockMode) {
        let slot = self.entries.entry(path).or_insert(mode);
        if mode > *slot {
            *slot = mode;
        }
    }

    pub fn mode(&self, path: &NsPath) -> Option<LockMode> {
        self.entries.get(path).copied()
    }
}

enum Held {
    Shared(#[allow(dead_code)] OwnedRwLockReadGuard<()>),
    Exclusive(#[allow(dead_code)] OwnedRwLockWriteGuard<()>),
}

/// Scoped ownership of a [`LockSet`]. Dropping it releases every lock,
/// on success, on error and when the owning task is cancelled.
pub struct PathGuard {
    held: Vec<(NsPath, Held)>,
    table: LockTable,
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        let paths: Vec<NsPath> = self.held.iter().map(|(p, _)| p.clone()).collect();
        while let Some((path, held)) = self.held.pop() {
            let mode = match held {
                Held::Shared(_) => "shared",
                Held::Exclusive(_) => "exclusive",
            };
            drop(held);
            debug!("Released {} lock on {}", mode, path);
        }

        let mut table = self.table.lock();
        for path in paths {
            // Waiters clone the entry under this same mutex, so a count of one
            // means only the table still refers to it
            if table.get(&path).is_some_and(|entry| Arc::strong_count(entry) == 1) {
                table.remove(&path);
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct PathLockManager {
    table: LockTable,
}

impl PathLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, path: &NsPath) -> Arc<RwLock<()>> {
        let mut table = self.table.lock();
        Arc::clone(
            table
                .entry(path.clone())
                .or_insert_with(|| Arc::new(RwLock::new(()))),
        )
    }

    /// Waits for every lock in `set`, in sorted order. Only requests sharing
    /// a path with `set` can delay this call.
    pub async fn acquire(&self, set: LockSet) -> PathGuard {
        let mut guard = PathGuard {
            held: Vec::with_capacity(set.entries.len()),
            table: Arc::clone(&self.table),
        };

        for (path, mode) in set.entries {
            let lock = self.entry(&path);
            let held = match mode {
                LockMode::Shared => Held::Shared(lock.read_owned().await),
                LockMode::Exclusive => Held::Exclusive(lock.write_owned().await),
            };
            debug!("Acquired {:?} lock on {}", mode, path);
            guard.held.push((path, held));
        }

        guard
    }

    /// Like [`acquire`](Self::acquire) but gives up with `Conflict` after
    /// `limit`. Partially acquired locks are released on the way out.
    pub async fn acquire_within(&self, set: LockSet, limit: Duration) -> Result<PathGuard, NfsError> {
        tokio::time::timeout(limit, self.acquire(set))
            .await
            .map_err(|_| NfsError::Conflict(format!("path busy for more than {limit:?}")))
    }

    /// Number of paths that currently have a live lock entry.
    pub fn tracked_paths(&self) -> usize {
        self.table.lock().len()
    }
}
