// src/watch/mock.rs

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::backend::{Change, ChangeKind, WatchBackend, WatchBatch, WatchHandle};
use crate::errors::{RedeployError, Result};

#[derive(Debug, Default)]
struct MockWatchState {
    next_handle: u64,
    watched: BTreeMap<PathBuf, WatchHandle>,
    queue: VecDeque<WatchBatch>,
    failing: HashSet<PathBuf>,
    unwatched: Vec<WatchHandle>,
}

/// Deterministic in-memory watch backend.
///
/// Nothing happens on its own: tests queue notifications with [`emit`] and
/// friends, and the code under test reads them back through `poll`. Clones
/// share state.
///
/// [`emit`]: MockWatchBackend::emit
#[derive(Debug, Clone, Default)]
pub struct MockWatchBackend {
    state: Arc<Mutex<MockWatchState>>,
}

impl MockWatchBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockWatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Currently watched directories, sorted.
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        self.state().watched.keys().cloned().collect()
    }

    pub fn handle_for(&self, dir: impl AsRef<Path>) -> Option<WatchHandle> {
        self.state().watched.get(dir.as_ref()).copied()
    }

    /// Handles released through `unwatch`, in call order.
    pub fn unwatched(&self) -> Vec<WatchHandle> {
        self.state().unwatched.clone()
    }

    /// Make every future `watch(dir)` call fail.
    pub fn fail_watch(&self, dir: impl Into<PathBuf>) {
        self.state().failing.insert(dir.into());
    }

    /// Queue a change for the handle watching `dir`.
    ///
    /// Returns `false` (and queues nothing) when `dir` is not watched.
    pub fn emit(&self, dir: impl AsRef<Path>, kind: ChangeKind, path: impl Into<PathBuf>) -> bool {
        let mut state = self.state();
        let Some(handle) = state.watched.get(dir.as_ref()).copied() else {
            return false;
        };
        state.queue.push_back(WatchBatch {
            handle,
            changes: vec![Change::new(kind, path)],
            still_valid: true,
        });
        true
    }

    /// Queue an arbitrary batch, including ones for handles never issued.
    pub fn emit_batch(&self, batch: WatchBatch) {
        self.state().queue.push_back(batch);
    }

    /// Report the handle watching `dir` as no longer valid, as happens when
    /// the directory is removed.
    pub fn invalidate(&self, dir: impl AsRef<Path>) -> Option<WatchHandle> {
        let mut state = self.state();
        let handle = state.watched.remove(dir.as_ref())?;
        state.queue.push_back(WatchBatch {
            handle,
            changes: Vec::new(),
            still_valid: false,
        });
        Some(handle)
    }

    pub fn pending(&self) -> usize {
        self.state().queue.len()
    }
}

impl WatchBackend for MockWatchBackend {
    fn watch(&mut self, dir: &Path) -> Result<WatchHandle> {
        let mut state = self.state();
        if state.failing.contains(dir) {
            return Err(RedeployError::Register {
                dir: dir.to_path_buf(),
                reason: "permission denied".to_string(),
            });
        }
        if let Some(handle) = state.watched.get(dir) {
            return Ok(*handle);
        }
        state.next_handle += 1;
        let handle = WatchHandle(state.next_handle);
        state.watched.insert(dir.to_path_buf(), handle);
        Ok(handle)
    }

    fn unwatch(&mut self, handle: WatchHandle) {
        let mut state = self.state();
        state.watched.retain(|_, h| *h != handle);
        state.unwatched.push(handle);
    }

    fn poll(&mut self) -> Option<WatchBatch> {
        self.state().queue.pop_front()
    }
}
