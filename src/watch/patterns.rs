// src/watch/patterns.rs

use std::fmt;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::errors::{RedeployError, Result};
use crate::watch::path_utils::relative_str;

/// Compiled `ignore` glob patterns.
///
/// Patterns are evaluated against paths relative to the module root that
/// owns the change, e.g. `"lib/.a.js.swp"`:
///
/// ```toml
/// [redeploy]
/// ignore = ["**/*.swp", "**/*~"]
/// ```
#[derive(Clone, Default)]
pub struct IgnoreSet {
    patterns: Vec<String>,
    set: Option<GlobSet>,
}

impl fmt::Debug for IgnoreSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IgnoreSet")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl IgnoreSet {
    /// Compile the given patterns. An empty list ignores nothing.
    pub fn new(patterns: &[String]) -> Result<Self> {
        if patterns.is_empty() {
            return Ok(Self::default());
        }

        let mut builder = GlobSetBuilder::new();
        for pat in patterns {
            let glob = Glob::new(pat).map_err(|e| {
                RedeployError::ConfigError(format!("invalid ignore pattern '{pat}': {e}"))
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|e| {
            RedeployError::ConfigError(format!("failed to build ignore glob set: {e}"))
        })?;

        Ok(Self {
            patterns: patterns.to_vec(),
            set: Some(set),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_none()
    }

    /// True if a change at `path` under `root` should not count as a change.
    pub fn is_ignored(&self, root: &Path, path: &Path) -> bool {
        let Some(set) = &self.set else {
            return false;
        };
        match relative_str(root, path) {
            Some(rel) => set.is_match(&rel),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[&str]) -> IgnoreSet {
        let owned: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        IgnoreSet::new(&owned).unwrap()
    }

    #[test]
    fn empty_set_ignores_nothing() {
        let s = IgnoreSet::new(&[]).unwrap();
        assert!(s.is_empty());
        assert!(!s.is_ignored(Path::new("/m"), Path::new("/m/a.swp")));
    }

    #[test]
    fn matches_relative_to_root() {
        let s = set(&["**/*.swp", "build/**"]);
        let root = Path::new("/mods/foo");

        assert!(s.is_ignored(root, Path::new("/mods/foo/lib/.a.js.swp")));
        assert!(s.is_ignored(root, Path::new("/mods/foo/build/out.js")));
        assert!(!s.is_ignored(root, Path::new("/mods/foo/lib/a.js")));
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let err = IgnoreSet::new(&["lib/[".to_string()]).unwrap_err();
        assert!(matches!(err, RedeployError::ConfigError(msg) if msg.contains("lib/[")));
    }
}
