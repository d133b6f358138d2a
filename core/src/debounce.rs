use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Trailing debounce with a single pending slot.
///
/// Every [`trigger`](Debouncer::trigger) cancels the callback scheduled by
/// the previous one and pushes the deadline out again. Once the quiet
/// period elapses the callback runs detached, so a later trigger no longer
/// interrupts it.
#[derive(Debug)]
pub struct Debouncer {
    delay: Mutex<Duration>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: Mutex::new(delay),
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        *self.delay.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    /// Schedule `callback` after the quiet period. Must be called inside a
    /// tokio runtime.
    pub fn trigger<F>(&self, callback: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(callback);
        });
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = pending.replace(handle) {
            previous.abort();
        }
    }

    /// Drop the scheduled callback, if any.
    pub fn cancel(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = pending.take() {
            previous.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_triggers_run_once() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let calls = Arc::clone(&calls);
            debouncer.trigger(async move {
                calls.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::advance(Duration::from_millis(100)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        tokio::time::advance(Duration::from_millis(500)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_callback() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        debouncer.trigger(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel();
        tokio::time::advance(Duration::from_millis(100)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_still_defers() {
        let debouncer = Debouncer::new(Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        debouncer.trigger(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
