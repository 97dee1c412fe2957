// src/watch/tree.rs

//! Recursive watch registration under module roots.
//!
//! The backend only ever tells us *which handle* saw a change. To turn that
//! into "module root X changed" the tree keeps three indices:
//!
//! - handle -> directory
//! - directory -> (handle, owning module root)
//! - module root -> handles covering its subtree
//!
//! Every registration or removal updates all three together. A registration
//! that fails halfway is rolled back so the indices never point at a
//! half-watched subtree.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::{RedeployError, Result};
use crate::fs::FileSystem;
use crate::watch::backend::{WatchBackend, WatchBatch, WatchHandle};

#[derive(Debug, Clone)]
struct WatchedDir {
    handle: WatchHandle,
    root: PathBuf,
}

/// Outcome of looking up a handle reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Handle covers a live directory belonging to `root`.
    Live { dir: PathBuf, root: PathBuf },
    /// Directory was deleted; its handle lingers until the backend reports
    /// it invalid. Notifications through it are stale.
    Retired,
    /// Handle is mapped to a directory that has no module root.
    Unresolved(PathBuf),
    /// Handle was never issued by this tree.
    Unknown,
}

#[derive(Debug)]
pub struct WatchTree {
    backend: Box<dyn WatchBackend>,
    fs: Arc<dyn FileSystem>,
    handles: HashMap<WatchHandle, PathBuf>,
    dirs: HashMap<PathBuf, WatchedDir>,
    roots: HashMap<PathBuf, HashSet<WatchHandle>>,
    retired: HashSet<WatchHandle>,
}

impl WatchTree {
    pub fn new(backend: Box<dyn WatchBackend>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            backend,
            fs,
            handles: HashMap::new(),
            dirs: HashMap::new(),
            roots: HashMap::new(),
            retired: HashSet::new(),
        }
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Watch every directory under `root`. No-op for an already known root.
    ///
    /// Returns the number of directories newly registered.
    pub fn register_root(&mut self, root: &Path) -> Result<usize> {
        if self.roots.contains_key(root) {
            debug!(?root, "module root already watched");
            return Ok(0);
        }
        self.roots.insert(root.to_path_buf(), HashSet::new());
        match self.register_subtree(root, root) {
            Ok(n) => {
                info!(?root, dirs = n, "watching module root");
                Ok(n)
            }
            Err(err) => {
                self.roots.remove(root);
                Err(err)
            }
        }
    }

    /// Extend coverage to a directory that appeared under a watched root.
    pub fn handle_directory_created(&mut self, dir: &Path) -> Result<usize> {
        let root = dir
            .parent()
            .and_then(|p| self.dirs.get(p))
            .map(|w| w.root.clone())
            .ok_or_else(|| RedeployError::UnresolvedDirectory(dir.to_path_buf()))?;
        self.register_subtree(&root, dir)
    }

    /// Forget `dir` and everything below it.
    ///
    /// The OS watch is not cancelled here: the backend reports the handle as
    /// invalid once the directory is really gone, and [`handle_invalidated`]
    /// drops it then. Until that happens the handle is retired, so stale
    /// notifications through it are not attributed to any root.
    ///
    /// [`handle_invalidated`]: WatchTree::handle_invalidated
    pub fn handle_directory_deleted(&mut self, dir: &Path) -> usize {
        let doomed: Vec<PathBuf> = self
            .dirs
            .keys()
            .filter(|d| d.starts_with(dir))
            .cloned()
            .collect();

        for d in &doomed {
            if let Some(watched) = self.dirs.remove(d) {
                if let Some(set) = self.roots.get_mut(&watched.root) {
                    set.remove(&watched.handle);
                }
                self.retired.insert(watched.handle);
                debug!(dir = ?d, handle = %watched.handle, "directory removed from watch index");
            }
        }
        doomed.len()
    }

    /// Drop a handle the backend reported as no longer valid.
    pub fn handle_invalidated(&mut self, handle: WatchHandle) {
        self.retired.remove(&handle);
        let Some(dir) = self.handles.remove(&handle) else {
            return;
        };
        if self.dirs.get(&dir).is_some_and(|w| w.handle == handle) {
            if let Some(watched) = self.dirs.remove(&dir) {
                if let Some(set) = self.roots.get_mut(&watched.root) {
                    set.remove(&handle);
                }
            }
        }
        debug!(?dir, %handle, "watch handle invalidated");
    }

    pub fn resolve(&self, handle: WatchHandle) -> Resolution {
        if self.retired.contains(&handle) {
            return Resolution::Retired;
        }
        let Some(dir) = self.handles.get(&handle) else {
            return Resolution::Unknown;
        };
        match self.dirs.get(dir) {
            Some(watched) if watched.handle == handle => Resolution::Live {
                dir: dir.clone(),
                root: watched.root.clone(),
            },
            _ => Resolution::Unresolved(dir.clone()),
        }
    }

    /// Stop watching a module root entirely, cancelling every OS watch.
    pub fn unregister_root(&mut self, root: &Path) -> usize {
        let Some(handles) = self.roots.remove(root) else {
            return 0;
        };
        for handle in &handles {
            self.backend.unwatch(*handle);
            if let Some(dir) = self.handles.remove(handle) {
                self.dirs.remove(&dir);
            }
        }
        // Retired handles under this root are no longer worth waiting for.
        let retired: Vec<WatchHandle> = self.retired.iter().copied().collect();
        for handle in retired {
            if self.handles.get(&handle).is_some_and(|d| d.starts_with(root)) {
                self.backend.unwatch(handle);
                self.handles.remove(&handle);
                self.retired.remove(&handle);
            }
        }
        info!(?root, dirs = handles.len(), "stopped watching module root");
        handles.len()
    }

    /// Next pending notification batch from the backend, without blocking.
    pub fn poll(&mut self) -> Option<WatchBatch> {
        self.backend.poll()
    }

    pub fn root_of(&self, dir: &Path) -> Option<&Path> {
        self.dirs.get(dir).map(|w| w.root.as_path())
    }

    pub fn is_root(&self, root: &Path) -> bool {
        self.roots.contains_key(root)
    }

    /// Directories currently covered under `root`, sorted.
    pub fn watched_dirs(&self, root: &Path) -> Vec<PathBuf> {
        let set: BTreeSet<PathBuf> = self
            .dirs
            .iter()
            .filter(|(_, w)| w.root == root)
            .map(|(d, _)| d.clone())
            .collect();
        set.into_iter().collect()
    }

    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    fn register_subtree(&mut self, root: &Path, top: &Path) -> Result<usize> {
        let dirs = walk_dirs(self.fs.as_ref(), top)?;
        let mut added: Vec<WatchHandle> = Vec::new();

        for dir in dirs {
            if self.dirs.contains_key(&dir) {
                continue;
            }
            match self.backend.watch(&dir) {
                Ok(handle) => {
                    debug!(?dir, %handle, "registered directory");
                    self.handles.insert(handle, dir.clone());
                    self.dirs.insert(
                        dir,
                        WatchedDir {
                            handle,
                            root: root.to_path_buf(),
                        },
                    );
                    self.roots
                        .entry(root.to_path_buf())
                        .or_default()
                        .insert(handle);
                    added.push(handle);
                }
                Err(err) => {
                    warn!(?dir, error = %err, "failed to watch directory; rolling back");
                    self.rollback(root, &added);
                    return Err(err);
                }
            }
        }
        Ok(added.len())
    }

    fn rollback(&mut self, root: &Path, added: &[WatchHandle]) {
        for handle in added {
            self.backend.unwatch(*handle);
            if let Some(dir) = self.handles.remove(handle) {
                self.dirs.remove(&dir);
            }
            if let Some(set) = self.roots.get_mut(root) {
                set.remove(handle);
            }
        }
    }
}

/// Pre-order walk of every directory under (and including) `top`.
fn walk_dirs(fs: &dyn FileSystem, top: &Path) -> Result<Vec<PathBuf>> {
    if !fs.is_dir(top) {
        return Err(RedeployError::Register {
            dir: top.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    let mut out = Vec::new();
    let mut stack = vec![top.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut children = fs.read_dir(&dir).map_err(|err| RedeployError::Register {
            dir: dir.clone(),
            reason: err.to_string(),
        })?;
        children.retain(|c| fs.is_dir(c));
        children.sort();
        // Reverse so the stack pops children in name order.
        stack.extend(children.into_iter().rev());
        out.push(dir);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::watch::mock::MockWatchBackend;

    fn tree_with(fs: &MockFileSystem, backend: &MockWatchBackend) -> WatchTree {
        WatchTree::new(Box::new(backend.clone()), Arc::new(fs.clone()))
    }

    fn sample_fs() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_file("/mods/foo/mod.json", "{}");
        fs.add_file("/mods/foo/lib/a.js", "a");
        fs.add_file("/mods/foo/lib/util/b.js", "b");
        fs.add_dir("/mods/foo/res");
        fs
    }

    #[test]
    fn register_root_watches_every_directory() {
        let fs = sample_fs();
        let backend = MockWatchBackend::new();
        let mut tree = tree_with(&fs, &backend);

        let n = tree.register_root(Path::new("/mods/foo")).unwrap();

        assert_eq!(n, 4);
        assert_eq!(
            backend.watched_dirs(),
            vec![
                PathBuf::from("/mods/foo"),
                PathBuf::from("/mods/foo/lib"),
                PathBuf::from("/mods/foo/lib/util"),
                PathBuf::from("/mods/foo/res"),
            ]
        );
        assert_eq!(
            tree.root_of(Path::new("/mods/foo/lib/util")),
            Some(Path::new("/mods/foo"))
        );
        assert_eq!(tree.register_root(Path::new("/mods/foo")).unwrap(), 0);
    }

    #[test]
    fn created_directory_joins_parent_root() {
        let fs = sample_fs();
        let backend = MockWatchBackend::new();
        let mut tree = tree_with(&fs, &backend);
        tree.register_root(Path::new("/mods/foo")).unwrap();

        fs.add_dir("/mods/foo/lib/new/deeper");
        let n = tree
            .handle_directory_created(Path::new("/mods/foo/lib/new"))
            .unwrap();

        assert_eq!(n, 2);
        assert_eq!(
            tree.root_of(Path::new("/mods/foo/lib/new/deeper")),
            Some(Path::new("/mods/foo"))
        );
    }

    #[test]
    fn created_directory_outside_any_root_is_unresolved() {
        let fs = sample_fs();
        fs.add_dir("/elsewhere/x");
        let backend = MockWatchBackend::new();
        let mut tree = tree_with(&fs, &backend);

        let err = tree
            .handle_directory_created(Path::new("/elsewhere/x"))
            .unwrap_err();
        assert!(matches!(err, RedeployError::UnresolvedDirectory(_)));
    }

    #[test]
    fn deleted_directory_is_retired_until_invalidated() {
        let fs = sample_fs();
        let backend = MockWatchBackend::new();
        let mut tree = tree_with(&fs, &backend);
        tree.register_root(Path::new("/mods/foo")).unwrap();
        let lib = backend.handle_for("/mods/foo/lib").unwrap();
        let util = backend.handle_for("/mods/foo/lib/util").unwrap();

        assert_eq!(tree.handle_directory_deleted(Path::new("/mods/foo/lib")), 2);

        assert_eq!(tree.root_of(Path::new("/mods/foo/lib")), None);
        assert_eq!(tree.resolve(lib), Resolution::Retired);
        assert_eq!(tree.resolve(util), Resolution::Retired);

        tree.handle_invalidated(lib);
        assert_eq!(tree.resolve(lib), Resolution::Unknown);
        assert!(backend.unwatched().is_empty());
    }

    #[test]
    fn failed_registration_rolls_back() {
        let fs = sample_fs();
        let backend = MockWatchBackend::new();
        backend.fail_watch("/mods/foo/res");
        let mut tree = tree_with(&fs, &backend);

        let err = tree.register_root(Path::new("/mods/foo")).unwrap_err();

        assert!(matches!(err, RedeployError::Register { .. }));
        assert!(!tree.is_root(Path::new("/mods/foo")));
        assert_eq!(tree.handle_count(), 0);
        assert!(backend.watched_dirs().is_empty());
    }

    #[test]
    fn unregister_root_cancels_all_watches() {
        let fs = sample_fs();
        let backend = MockWatchBackend::new();
        let mut tree = tree_with(&fs, &backend);
        tree.register_root(Path::new("/mods/foo")).unwrap();

        assert_eq!(tree.unregister_root(Path::new("/mods/foo")), 4);

        assert_eq!(backend.unwatched().len(), 4);
        assert_eq!(tree.handle_count(), 0);
        assert!(tree.watched_dirs(Path::new("/mods/foo")).is_empty());
    }
}
