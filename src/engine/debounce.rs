// src/engine/debounce.rs

//! Quiescence gate for changed module roots.
//!
//! One logical edit usually produces a burst of notifications (temp file,
//! rename, several files in one save). A root only becomes eligible for
//! redeploy once it has been quiet for longer than the grace window, which
//! collapses the whole burst into a single redeploy.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct DebounceGate {
    last_change: HashMap<PathBuf, Instant>,
}

impl DebounceGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that every root in `changed` was touched at `now`.
    pub fn observe<I>(&mut self, changed: I, now: Instant)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        for root in changed {
            self.last_change.insert(root, now);
        }
    }

    /// Remove and return every root quiet for longer than `grace`, sorted.
    ///
    /// A root comes out at most once per quiet period; it has to be observed
    /// again before it can be returned again.
    pub fn stable_roots(&mut self, now: Instant, grace: Duration) -> Vec<PathBuf> {
        let mut stable: Vec<PathBuf> = self
            .last_change
            .iter()
            .filter(|(_, last)| now.saturating_duration_since(**last) > grace)
            .map(|(root, _)| root.clone())
            .collect();
        stable.sort();

        for root in &stable {
            self.last_change.remove(root);
        }
        stable
    }

    pub fn forget(&mut self, root: &Path) {
        self.last_change.remove(root);
    }

    pub fn is_pending(&self, root: &Path) -> bool {
        self.last_change.contains_key(root)
    }

    pub fn pending_len(&self) -> usize {
        self.last_change.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRACE: Duration = Duration::from_millis(500);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn root_is_released_only_after_grace() {
        let t0 = Instant::now();
        let mut gate = DebounceGate::new();
        gate.observe([PathBuf::from("/m/a")], t0);

        assert!(gate.stable_roots(t0 + ms(200), GRACE).is_empty());
        assert!(gate.stable_roots(t0 + ms(500), GRACE).is_empty());
        assert_eq!(gate.stable_roots(t0 + ms(600), GRACE), vec![PathBuf::from("/m/a")]);
        assert!(gate.stable_roots(t0 + ms(800), GRACE).is_empty());
    }

    #[test]
    fn later_change_restarts_the_window() {
        let t0 = Instant::now();
        let mut gate = DebounceGate::new();
        gate.observe([PathBuf::from("/m/a")], t0);
        gate.observe([PathBuf::from("/m/a")], t0 + ms(400));

        assert!(gate.stable_roots(t0 + ms(600), GRACE).is_empty());
        assert_eq!(gate.stable_roots(t0 + ms(1000), GRACE).len(), 1);
        assert_eq!(gate.pending_len(), 0);
    }

    #[test]
    fn roots_are_independent() {
        let t0 = Instant::now();
        let mut gate = DebounceGate::new();
        gate.observe([PathBuf::from("/m/a")], t0);
        gate.observe([PathBuf::from("/m/b")], t0 + ms(300));

        assert_eq!(gate.stable_roots(t0 + ms(600), GRACE), vec![PathBuf::from("/m/a")]);
        assert!(gate.is_pending(Path::new("/m/b")));
        assert_eq!(gate.stable_roots(t0 + ms(900), GRACE), vec![PathBuf::from("/m/b")]);
    }
}
