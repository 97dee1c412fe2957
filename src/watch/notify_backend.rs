// src/watch/notify_backend.rs

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::backend::{Change, ChangeKind, WatchBackend, WatchBatch, WatchHandle};
use crate::errors::{RedeployError, Result};

/// Watch backend on top of `notify`'s `RecommendedWatcher`.
///
/// Every directory gets its own non-recursive watch so that the watch tree
/// decides which subdirectories are covered. The notify callback runs on
/// notify's own thread; events are forwarded over an unbounded channel and
/// only translated into [`WatchBatch`]es when the tick driver polls.
pub struct NotifyBackend {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    next_handle: u64,
    by_dir: HashMap<PathBuf, WatchHandle>,
    by_handle: HashMap<WatchHandle, PathBuf>,
    pending: VecDeque<WatchBatch>,
}

impl std::fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBackend")
            .field("watched", &self.by_dir.len())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl NotifyBackend {
    /// Create the underlying OS watcher. Failure here is a setup failure for
    /// the whole redeployer.
    pub fn new() -> Result<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // Receiver gone means the backend was dropped; nothing to do.
                let _ = event_tx.send(res);
            },
            Config::default(),
        )?;

        Ok(Self {
            watcher,
            event_rx,
            next_handle: 0,
            by_dir: HashMap::new(),
            by_handle: HashMap::new(),
            pending: VecDeque::new(),
        })
    }

    fn fill_pending(&mut self) {
        while let Ok(res) = self.event_rx.try_recv() {
            match res {
                Ok(event) => self.translate(event),
                Err(err) => {
                    // Errors carrying paths are attributed as overflow on the
                    // covering handles; anything else is just logged.
                    warn!(error = %err, paths = ?err.paths, "file watch error");
                    let paths = err.paths.clone();
                    for path in paths {
                        self.push_overflow_for(&path);
                    }
                }
            }
        }
    }

    fn translate(&mut self, event: Event) {
        debug!(?event, "received notify event");

        if event.need_rescan() {
            if event.paths.is_empty() {
                let handles: Vec<(WatchHandle, PathBuf)> = self
                    .by_handle
                    .iter()
                    .map(|(h, d)| (*h, d.clone()))
                    .collect();
                for (handle, dir) in handles {
                    self.push(handle, Change::new(ChangeKind::Overflow, dir));
                }
            } else {
                for path in &event.paths {
                    self.push_overflow_for(path);
                }
            }
            return;
        }

        for (kind, path) in classify(&event) {
            self.attribute(kind, path);
        }
    }

    fn attribute(&mut self, kind: ChangeKind, path: PathBuf) {
        let parent_handle = path.parent().and_then(|p| self.by_dir.get(p)).copied();
        let own_handle = self.by_dir.get(&path).copied();

        match (parent_handle, own_handle) {
            (Some(handle), _) => self.push(handle, Change::new(kind, path.clone())),
            // Event on a watched directory whose parent is not watched
            // (typically a module root itself).
            (None, Some(handle)) if kind != ChangeKind::Delete => {
                self.push(handle, Change::new(ChangeKind::Modify, path.clone()));
            }
            (None, Some(_)) => {}
            (None, None) => debug!(?path, "no watch covers event path; dropping"),
        }

        // A removed or renamed-away directory loses its watch. For a rename
        // the kernel would keep following the moved inode, so drop it here.
        if kind == ChangeKind::Delete {
            if let Some(handle) = own_handle {
                self.by_dir.remove(&path);
                self.by_handle.remove(&handle);
                if let Err(err) = self.watcher.unwatch(&path) {
                    debug!(?path, error = %err, "watch already gone with its directory");
                }
                self.pending.push_back(WatchBatch {
                    handle,
                    changes: Vec::new(),
                    still_valid: false,
                });
            }
        }
    }

    fn push_overflow_for(&mut self, path: &Path) {
        let handle = self
            .by_dir
            .get(path)
            .or_else(|| path.parent().and_then(|p| self.by_dir.get(p)))
            .copied();
        if let Some(handle) = handle {
            self.push(handle, Change::new(ChangeKind::Overflow, path));
        }
    }

    fn push(&mut self, handle: WatchHandle, change: Change) {
        // Coalesce consecutive changes for the same handle into one batch.
        if let Some(last) = self.pending.back_mut() {
            if last.handle == handle && last.still_valid {
                last.changes.push(change);
                return;
            }
        }
        self.pending.push_back(WatchBatch {
            handle,
            changes: vec![change],
            still_valid: true,
        });
    }
}

/// Map a notify event onto create/modify/delete changes.
///
/// Renames are split: the old name is a delete, the new name a create.
fn classify(event: &Event) -> Vec<(ChangeKind, PathBuf)> {
    let all = |kind: ChangeKind| -> Vec<(ChangeKind, PathBuf)> {
        event.paths.iter().map(|p| (kind, p.clone())).collect()
    };

    match &event.kind {
        EventKind::Access(_) => Vec::new(),
        EventKind::Create(_) => all(ChangeKind::Create),
        EventKind::Remove(_) => all(ChangeKind::Delete),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => all(ChangeKind::Delete),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => all(ChangeKind::Create),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut out = Vec::with_capacity(event.paths.len());
            for (i, p) in event.paths.iter().enumerate() {
                let kind = if i == 0 {
                    ChangeKind::Delete
                } else {
                    ChangeKind::Create
                };
                out.push((kind, p.clone()));
            }
            out
        }
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                let kind = if p.exists() {
                    ChangeKind::Create
                } else {
                    ChangeKind::Delete
                };
                (kind, p.clone())
            })
            .collect(),
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => all(ChangeKind::Modify),
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&mut self, dir: &Path) -> Result<WatchHandle> {
        if let Some(handle) = self.by_dir.get(dir) {
            return Ok(*handle);
        }

        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|err| RedeployError::Register {
                dir: dir.to_path_buf(),
                reason: err.to_string(),
            })?;

        self.next_handle += 1;
        let handle = WatchHandle(self.next_handle);
        self.by_dir.insert(dir.to_path_buf(), handle);
        self.by_handle.insert(handle, dir.to_path_buf());
        Ok(handle)
    }

    fn unwatch(&mut self, handle: WatchHandle) {
        let Some(dir) = self.by_handle.remove(&handle) else {
            return;
        };
        self.by_dir.remove(&dir);
        if let Err(err) = self.watcher.unwatch(&dir) {
            debug!(?dir, error = %err, "unwatch failed; directory probably gone already");
        }
    }

    fn poll(&mut self) -> Option<WatchBatch> {
        if self.pending.is_empty() {
            self.fill_pending();
        }
        self.pending.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, Flag, RemoveKind};

    fn backend_watching(dirs: &[&str]) -> NotifyBackend {
        let mut backend = NotifyBackend::new().unwrap();
        for (i, dir) in dirs.iter().enumerate() {
            let handle = WatchHandle(i as u64 + 1);
            backend.by_dir.insert(PathBuf::from(dir), handle);
            backend.by_handle.insert(handle, PathBuf::from(dir));
        }
        backend
    }

    fn overflowed(backend: &mut NotifyBackend) -> Vec<(WatchHandle, PathBuf)> {
        let mut out: Vec<(WatchHandle, PathBuf)> = backend
            .pending
            .drain(..)
            .flat_map(|batch| {
                let handle = batch.handle;
                batch
                    .changes
                    .into_iter()
                    .filter(|c| c.kind == ChangeKind::Overflow)
                    .map(move |c| (handle, c.path))
            })
            .collect();
        out.sort();
        out
    }

    #[test]
    fn rescan_with_paths_overflows_covering_handles() {
        let mut backend = backend_watching(&["/m", "/m/lib"]);
        let event = Event::new(EventKind::Other)
            .set_flag(Flag::Rescan)
            .add_path(PathBuf::from("/m/lib"))
            .add_path(PathBuf::from("/m/lib/a.js"));

        backend.translate(event);

        assert_eq!(
            overflowed(&mut backend),
            vec![
                (WatchHandle(2), PathBuf::from("/m/lib")),
                (WatchHandle(2), PathBuf::from("/m/lib/a.js")),
            ]
        );
    }

    #[test]
    fn rescan_without_paths_overflows_every_handle() {
        let mut backend = backend_watching(&["/m", "/m/lib", "/n"]);

        backend.translate(Event::new(EventKind::Other).set_flag(Flag::Rescan));

        assert_eq!(
            overflowed(&mut backend),
            vec![
                (WatchHandle(1), PathBuf::from("/m")),
                (WatchHandle(2), PathBuf::from("/m/lib")),
                (WatchHandle(3), PathBuf::from("/n")),
            ]
        );
    }

    #[test]
    fn renames_split_into_delete_and_create() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/m/a.tmp"))
            .add_path(PathBuf::from("/m/a.js"));

        assert_eq!(
            classify(&event),
            vec![
                (ChangeKind::Delete, PathBuf::from("/m/a.tmp")),
                (ChangeKind::Create, PathBuf::from("/m/a.js")),
            ]
        );
    }

    #[test]
    fn access_events_are_ignored() {
        let event = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/m/a.js"));
        assert!(classify(&event).is_empty());
    }

    #[test]
    fn create_and_remove_keep_their_kind() {
        let create = Event::new(EventKind::Create(CreateKind::Folder)).add_path(PathBuf::from("/m/lib"));
        let remove = Event::new(EventKind::Remove(RemoveKind::File)).add_path(PathBuf::from("/m/a.js"));

        assert_eq!(classify(&create), vec![(ChangeKind::Create, PathBuf::from("/m/lib"))]);
        assert_eq!(classify(&remove), vec![(ChangeKind::Delete, PathBuf::from("/m/a.js"))]);
    }
}
