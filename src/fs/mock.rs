// src/fs/mock.rs

use super::FileSystem;
use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir,
}

/// In-memory filesystem keyed by absolute path.
///
/// Parent directories are created implicitly. Clones share the same tree, so
/// a test can keep one handle while the code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<BTreeMap<PathBuf, MockEntry>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<PathBuf, MockEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        let mut entries = self.entries();
        if let Some(parent) = path.parent() {
            ensure_dirs(&mut entries, parent);
        }
        entries.insert(path.to_path_buf(), MockEntry::File(content.into()));
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut entries = self.entries();
        ensure_dirs(&mut entries, path.as_ref());
    }

    /// Remove `path` and everything below it.
    pub fn remove_tree(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.entries().retain(|p, _| !p.starts_with(path));
    }
}

fn ensure_dirs(entries: &mut BTreeMap<PathBuf, MockEntry>, dir: &Path) {
    for ancestor in dir.ancestors() {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        entries
            .entry(ancestor.to_path_buf())
            .or_insert(MockEntry::Dir);
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.entries().contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.entries().get(path), Some(MockEntry::Dir))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        // Tests use absolute paths throughout; only existence is checked.
        if self.exists(path) {
            Ok(path.to_path_buf())
        } else {
            Err(anyhow!("No such file or directory: {:?}", path))
        }
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut entries = self.entries();
        match entries.get(path) {
            Some(MockEntry::File(_)) => {
                entries.remove(path);
                Ok(())
            }
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let entries = self.entries();
        match entries.get(path) {
            Some(MockEntry::Dir) => Ok(entries
                .keys()
                .filter(|p| p.parent() == Some(path))
                .cloned()
                .collect()),
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parents_are_created_implicitly() {
        let fs = MockFileSystem::new();
        fs.add_file("/mods/foo/lib/a.js", "x");

        assert!(fs.is_dir(Path::new("/mods/foo/lib")));
        assert!(fs.is_dir(Path::new("/mods")));
        assert_eq!(
            fs.read_dir(Path::new("/mods/foo")).unwrap(),
            vec![PathBuf::from("/mods/foo/lib")]
        );
    }

    #[test]
    fn remove_tree_drops_descendants() {
        let fs = MockFileSystem::new();
        fs.add_file("/mods/foo/lib/a.js", "x");
        fs.add_dir("/mods/foo/res");

        fs.remove_tree("/mods/foo/lib");

        assert!(!fs.exists(Path::new("/mods/foo/lib/a.js")));
        assert_eq!(
            fs.read_dir(Path::new("/mods/foo")).unwrap(),
            vec![PathBuf::from("/mods/foo/res")]
        );
    }
}
