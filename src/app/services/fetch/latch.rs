//! Countdown completion barrier for a fetch run

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Barrier released once every dispatched task has counted down
///
/// Counting down below zero is ignored, so a task reaching the barrier twice
/// cannot release it early for others.
#[derive(Debug)]
pub struct CompletionLatch {
    remaining: AtomicUsize,
    released: Notify,
}

impl CompletionLatch {
    pub fn new(count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
            released: Notify::new(),
        }
    }

    /// Tasks still outstanding
    pub fn count(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Record one finished task, waking waiters on the last one
    pub fn count_down(&self) {
        let previous = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));

        if previous == Ok(1) {
            self.released.notify_waiters();
        }
    }

    /// Wait until the count reaches zero
    pub async fn wait(&self) {
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}
