//! Process-wide readiness events.
//!
//! Two of these exist: "DAW connected" (first successful TCP session)
//! and "catalog populated" (first non-empty populate). Both are
//! monotonic: once set they stay set for the process lifetime, so
//! handlers can wait with a bounded timeout and never observe a
//! flap back to unready.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct ReadyFlag {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl ReadyFlag {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Latch the event. Idempotent.
    pub fn set(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_set(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until set, at most `timeout`. Returns whether the event is
    /// set when the wait ends.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return true;
        }
        let result = tokio::time::timeout(timeout, rx.wait_for(|ready| *ready)).await;
        result.is_ok()
    }

    /// Wait without a deadline. Used only by background tasks, never by
    /// request handlers.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl Default for ReadyFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_is_monotonic_and_observable() {
        let flag = ReadyFlag::new();
        assert!(!flag.is_set());
        assert!(!flag.wait_timeout(Duration::from_millis(10)).await);

        flag.set();
        assert!(flag.is_set());
        assert!(flag.wait_timeout(Duration::from_millis(10)).await);

        // Setting again changes nothing.
        flag.set();
        assert!(flag.is_set());
    }

    #[tokio::test]
    async fn waiters_wake_on_set() {
        let flag = ReadyFlag::new();
        let waiter = flag.clone();
        let task = tokio::spawn(async move { waiter.wait_timeout(Duration::from_secs(5)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        flag.set();
        assert!(task.await.unwrap());
    }
}
