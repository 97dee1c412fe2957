// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

/// Abstract filesystem interface.
///
/// The watch tree walks module directories through this trait and the
/// marker strategy probes and consumes sentinel files through it.
pub trait FileSystem: Send + Sync + Debug {
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Return a list of entries in a directory.
    /// Returns full paths.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        // Symlinked directories are not followed, matching a non-following walk.
        fs::symlink_metadata(path)
            .map(|m| m.file_type().is_dir())
            .unwrap_or(false)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).with_context(|| format!("canonicalizing {:?}", path))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).with_context(|| format!("removing file {:?}", path))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            entries.push(entry.path());
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_fs_lists_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFileSystem;
        let marker = dir.path().join("nested").join(".redeployme");

        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(&marker, b"").unwrap();
        assert!(fs.exists(&marker));
        assert!(fs.is_dir(&dir.path().join("nested")));
        assert!(!fs.is_dir(&marker));

        let entries = fs.read_dir(dir.path()).unwrap();
        assert_eq!(entries, vec![dir.path().join("nested")]);

        fs.remove_file(&marker).unwrap();
        assert!(!fs.exists(&marker));
        assert!(fs.remove_file(&marker).is_err());
    }
}
