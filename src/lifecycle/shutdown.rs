//! Shutdown coordination.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

/// Error returned when the shutdown signal is triggered a second time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("shutdown already triggered")]
pub struct AlreadyTriggered;

/// Once-only shutdown signal.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
/// Subscribe before spawning a task so the signal cannot be missed.
#[derive(Debug)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Only the first call succeeds.
    pub fn trigger(&self) -> Result<(), AlreadyTriggered> {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return Err(AlreadyTriggered);
        }
        let _ = self.tx.send(());
        Ok(())
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn triggers_once() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 1);

        assert!(shutdown.trigger().is_ok());
        assert!(rx.recv().await.is_ok());
        assert!(shutdown.is_triggered());

        assert_eq!(shutdown.trigger(), Err(AlreadyTriggered));
    }
}
