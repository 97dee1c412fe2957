// src/engine/counter.rs

//! Fan-out/fan-in gate used to hold a timer until a batch of redeploys is
//! done.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Counts started and completed operations.
///
/// The driver calls [`increment`] once per redeploy it starts, each redeploy
/// calls [`complete`] when it finishes, and [`wait`] resolves once nothing
/// is outstanding. Increments must all happen before `wait` is awaited;
/// the counter does not know how many operations a batch will contain.
///
/// [`increment`]: CompletionCounter::increment
/// [`complete`]: CompletionCounter::complete
/// [`wait`]: CompletionCounter::wait
#[derive(Debug, Default)]
pub struct CompletionCounter {
    required: AtomicUsize,
    completed: AtomicUsize,
    notify: Notify,
}

impl CompletionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.required.fetch_add(1, Ordering::SeqCst);
    }

    pub fn complete(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        if self.is_idle() {
            self.notify.notify_waiters();
        }
    }

    pub fn required(&self) -> usize {
        self.required.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> usize {
        self.required().saturating_sub(self.completed())
    }

    /// All started, none pending.
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Resolve once every started operation has completed. Resolves at once
    /// when nothing was started.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register interest before checking, so a completion racing
            // with the check still wakes us.
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn empty_counter_is_immediately_idle() {
        let counter = CompletionCounter::new();
        tokio::time::timeout(Duration::from_secs(1), counter.wait())
            .await
            .expect("wait should resolve at once");
    }

    #[tokio::test]
    async fn wait_resolves_after_last_completion() {
        let counter = Arc::new(CompletionCounter::new());
        counter.increment();
        counter.increment();

        let waiter = {
            let counter = Arc::clone(&counter);
            tokio::spawn(async move { counter.wait().await })
        };

        counter.complete();
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        assert_eq!(counter.pending(), 1);

        counter.complete();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
        assert_eq!(counter.required(), 2);
        assert_eq!(counter.completed(), 2);
    }
}
