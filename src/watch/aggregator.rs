// src/watch/aggregator.rs

//! Folding raw watch notifications into the set of changed module roots.

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::{debug, error, warn};

use crate::errors::{RedeployError, Result};
use crate::watch::backend::{ChangeKind, WatchBatch};
use crate::watch::patterns::IgnoreSet;
use crate::watch::tree::{Resolution, WatchTree};

/// Drain every pending notification, adding the module roots touched to
/// `changed`.
///
/// This never waits: it returns as soon as the backend has nothing queued.
/// Along the way the tree is kept in sync with the filesystem: new
/// directories are watched, deleted ones forgotten, dead handles dropped.
///
/// A notification through a handle the tree cannot place is an index bug
/// and aborts the drain with an error. Roots added to `changed` before that
/// point stay there; batches not yet read stay queued for the next tick.
pub fn drain_changes(
    tree: &mut WatchTree,
    ignore: &IgnoreSet,
    changed: &mut BTreeSet<PathBuf>,
) -> Result<()> {
    while let Some(batch) = tree.poll() {
        apply_batch(tree, ignore, batch, changed)?;
    }
    Ok(())
}

fn apply_batch(
    tree: &mut WatchTree,
    ignore: &IgnoreSet,
    batch: WatchBatch,
    changed: &mut BTreeSet<PathBuf>,
) -> Result<()> {
    let WatchBatch {
        handle,
        changes,
        still_valid,
    } = batch;

    let (dir, root) = match tree.resolve(handle) {
        Resolution::Live { dir, root } => (dir, root),
        Resolution::Retired => {
            debug!(%handle, dropped = changes.len(), "stale notifications for deleted directory");
            if !still_valid {
                tree.handle_invalidated(handle);
            }
            return Ok(());
        }
        Resolution::Unresolved(dir) if changes.is_empty() && !still_valid => {
            debug!(?dir, %handle, "handle for unindexed directory closed");
            tree.handle_invalidated(handle);
            return Ok(());
        }
        Resolution::Unresolved(dir) => {
            error!(?dir, %handle, "watched directory has no module root");
            return Err(RedeployError::UnresolvedDirectory(dir));
        }
        Resolution::Unknown if changes.is_empty() && !still_valid => {
            // Invalidation of a handle we already dropped.
            return Ok(());
        }
        Resolution::Unknown => {
            error!(%handle, "unrecognised watch handle");
            return Err(RedeployError::UnknownWatchHandle(handle));
        }
    };

    for change in changes {
        match change.kind {
            ChangeKind::Overflow => {
                warn!(?dir, ?root, "watch overflow; assuming module changed");
                changed.insert(root.clone());
                continue;
            }
            ChangeKind::Modify => {
                debug!(path = ?change.path, "entry modified");
            }
            ChangeKind::Create => {
                debug!(path = ?change.path, "entry created");
                if tree.fs().is_dir(&change.path) {
                    if let Err(err) = tree.handle_directory_created(&change.path) {
                        // The root is still marked changed below; its new
                        // subdirectory just is not covered.
                        error!(
                            dir = ?change.path,
                            ?root,
                            error = %err,
                            "failed to extend watch to new directory"
                        );
                    }
                }
            }
            ChangeKind::Delete => {
                debug!(path = ?change.path, "entry deleted");
                tree.handle_directory_deleted(&change.path);
            }
        }

        if ignore.is_ignored(&root, &change.path) {
            debug!(path = ?change.path, "change matches ignore pattern");
            continue;
        }
        changed.insert(root.clone());
    }

    if !still_valid {
        tree.handle_invalidated(handle);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    use crate::fs::mock::MockFileSystem;
    use crate::watch::backend::{Change, WatchHandle};
    use crate::watch::mock::MockWatchBackend;

    fn setup() -> (MockFileSystem, MockWatchBackend, WatchTree) {
        let fs = MockFileSystem::new();
        fs.add_file("/mods/foo/lib/a.js", "a");
        fs.add_file("/mods/bar/main.js", "b");
        let backend = MockWatchBackend::new();
        let mut tree = WatchTree::new(Box::new(backend.clone()), Arc::new(fs.clone()));
        tree.register_root(Path::new("/mods/foo")).unwrap();
        tree.register_root(Path::new("/mods/bar")).unwrap();
        (fs, backend, tree)
    }

    fn roots(paths: &[&str]) -> BTreeSet<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    fn drain(tree: &mut WatchTree, ignore: &IgnoreSet) -> Result<BTreeSet<PathBuf>> {
        let mut changed = BTreeSet::new();
        drain_changes(tree, ignore, &mut changed)?;
        Ok(changed)
    }

    #[test]
    fn resolves_changes_to_their_module_root() {
        let (_fs, backend, mut tree) = setup();
        backend.emit("/mods/foo/lib", ChangeKind::Modify, "/mods/foo/lib/a.js");
        backend.emit("/mods/foo", ChangeKind::Modify, "/mods/foo/mod.json");

        let changed = drain(&mut tree, &IgnoreSet::default()).unwrap();

        assert_eq!(changed, roots(&["/mods/foo"]));
        assert_eq!(backend.pending(), 0);
    }

    #[test]
    fn empty_queue_returns_immediately() {
        let (_fs, _backend, mut tree) = setup();
        assert!(drain(&mut tree, &IgnoreSet::default()).unwrap().is_empty());
    }

    #[test]
    fn new_directory_is_watched_and_attributed() {
        let (fs, backend, mut tree) = setup();
        fs.add_dir("/mods/bar/views");
        backend.emit("/mods/bar", ChangeKind::Create, "/mods/bar/views");
        drain(&mut tree, &IgnoreSet::default()).unwrap();

        assert!(backend.emit("/mods/bar/views", ChangeKind::Create, "/mods/bar/views/x.html"));
        let changed = drain(&mut tree, &IgnoreSet::default()).unwrap();
        assert_eq!(changed, roots(&["/mods/bar"]));
    }

    #[test]
    fn overflow_marks_root_changed() {
        let (_fs, backend, mut tree) = setup();
        backend.emit("/mods/bar", ChangeKind::Overflow, "/mods/bar");

        let changed = drain(&mut tree, &IgnoreSet::default()).unwrap();
        assert_eq!(changed, roots(&["/mods/bar"]));
    }

    #[test]
    fn unknown_handle_is_reported() {
        let (_fs, backend, mut tree) = setup();
        backend.emit("/mods/bar", ChangeKind::Modify, "/mods/bar/main.js");
        backend.emit_batch(WatchBatch {
            handle: WatchHandle(999),
            changes: vec![Change::new(ChangeKind::Modify, "/mods/ghost/x")],
            still_valid: true,
        });
        backend.emit("/mods/foo/lib", ChangeKind::Modify, "/mods/foo/lib/a.js");

        let mut changed = BTreeSet::new();
        let err = drain_changes(&mut tree, &IgnoreSet::default(), &mut changed).unwrap_err();
        assert!(matches!(err, RedeployError::UnknownWatchHandle(WatchHandle(999))));
        assert_eq!(changed, roots(&["/mods/bar"]));

        // The batch after the bad one is read on the next drain.
        assert_eq!(drain(&mut tree, &IgnoreSet::default()).unwrap(), roots(&["/mods/foo"]));
    }

    #[test]
    fn stale_notifications_after_delete_are_dropped() {
        let (fs, backend, mut tree) = setup();
        let lib = backend.handle_for("/mods/foo/lib").unwrap();
        fs.remove_tree("/mods/foo/lib");
        backend.emit("/mods/foo", ChangeKind::Delete, "/mods/foo/lib");
        let changed = drain(&mut tree, &IgnoreSet::default()).unwrap();
        assert_eq!(changed, roots(&["/mods/foo"]));

        backend.emit_batch(WatchBatch {
            handle: lib,
            changes: vec![Change::new(ChangeKind::Delete, "/mods/foo/lib/a.js")],
            still_valid: false,
        });
        let changed = drain(&mut tree, &IgnoreSet::default()).unwrap();
        assert!(changed.is_empty());
        assert_eq!(tree.resolve(lib), Resolution::Unknown);
    }

    #[test]
    fn ignored_paths_do_not_count() {
        let (_fs, backend, mut tree) = setup();
        let ignore = IgnoreSet::new(&["**/*.swp".to_string()]).unwrap();
        backend.emit("/mods/foo/lib", ChangeKind::Create, "/mods/foo/lib/.a.js.swp");

        assert!(drain(&mut tree, &ignore).unwrap().is_empty());
    }
}
