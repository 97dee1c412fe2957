// src/watch/backend.rs

//! Pluggable watch facility abstraction.
//!
//! The watch tree talks to a `WatchBackend` instead of `notify` directly.
//! This makes it easy to swap in a deterministic backend in tests while
//! keeping the production implementation in [`super::notify_backend`].
//!
//! A backend hands out one [`WatchHandle`] per watched directory. Pending
//! notifications are read back with [`WatchBackend::poll`], grouped into a
//! [`WatchBatch`] per handle, much like reading a key off an OS watch queue.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::Result;

/// Opaque registration for a single watched directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchHandle(pub u64);

impl fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What happened to an entry inside a watched directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Modify,
    Delete,
    /// The backend lost event detail; assume anything under the handle changed.
    Overflow,
}

/// A single change notification.
///
/// `path` is the absolute path of the affected entry (for `Overflow`, the
/// watched directory itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl Change {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// All changes read through one handle, plus whether the handle is still
/// usable afterwards. A handle turns invalid once its directory is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchBatch {
    pub handle: WatchHandle,
    pub changes: Vec<Change>,
    pub still_valid: bool,
}

/// Trait abstracting the OS watch facility.
///
/// Production code uses [`super::NotifyBackend`]; tests use
/// [`super::MockWatchBackend`].
pub trait WatchBackend: Send + fmt::Debug {
    /// Start watching `dir` (non-recursively) for create/modify/delete.
    fn watch(&mut self, dir: &Path) -> Result<WatchHandle>;

    /// Stop watching. Unknown or already-invalid handles are ignored.
    fn unwatch(&mut self, handle: WatchHandle);

    /// Return the next pending batch, or `None` immediately when nothing is
    /// pending. Must never block.
    fn poll(&mut self) -> Option<WatchBatch>;
}
