//! Shutdown coordination.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::info;

/// Process-wide cancellation context.
///
/// Cloned into the router (to refuse new deliveries once shutdown starts),
/// the signal task and the lifecycle controller.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    /// Shutdown signal sender.
    sender: broadcast::Sender<()>,
    /// Shutdown initiated flag.
    initiated: Arc<AtomicBool>,
    /// Shutdown complete notifier.
    complete_tx: Arc<watch::Sender<bool>>,
    /// Shutdown complete receiver.
    complete_rx: watch::Receiver<bool>,
    /// Grace period for in-flight requests.
    timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(timeout: Duration) -> Self {
        let (sender, _) = broadcast::channel(1);
        let (complete_tx, complete_rx) = watch::channel(false);

        Self {
            sender,
            initiated: Arc::new(AtomicBool::new(false)),
            complete_tx: Arc::new(complete_tx),
            complete_rx,
            timeout,
        }
    }

    /// Check if shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.initiated.load(Ordering::SeqCst)
    }

    /// Initiate shutdown. Later calls are no-ops.
    pub fn initiate(&self) {
        if self.initiated.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Initiating graceful shutdown...");
        let _ = self.sender.send(());
    }

    /// Resolve once shutdown has been initiated, including before this call.
    pub async fn cancelled(&self) {
        let mut rx = self.sender.subscribe();
        if self.is_shutting_down() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// Wait for shutdown completion.
    pub async fn wait_for_completion(&self) {
        let mut rx = self.complete_rx.clone();
        let _ = rx.wait_for(|&complete| complete).await;
    }

    /// Whether [`ShutdownCoordinator::complete`] has been called.
    pub fn is_complete(&self) -> bool {
        *self.complete_rx.borrow()
    }

    /// Mark shutdown as complete.
    pub fn complete(&self) {
        info!("Shutdown complete");
        let _ = self.complete_tx.send(true);
    }

    /// Get the grace period.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancelled_after_initiate() {
        let coordinator = ShutdownCoordinator::default();
        coordinator.initiate();
        // Already initiated: returns immediately.
        tokio::time::timeout(Duration::from_secs(1), coordinator.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiters() {
        let coordinator = ShutdownCoordinator::default();
        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.cancelled().await })
        };
        tokio::task::yield_now().await;
        assert!(!coordinator.is_shutting_down());

        coordinator.initiate();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_initiate_is_idempotent() {
        let coordinator = ShutdownCoordinator::new(Duration::from_millis(10));
        coordinator.initiate();
        coordinator.initiate();
        assert!(coordinator.is_shutting_down());
        assert_eq!(coordinator.timeout(), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_completion() {
        let coordinator = ShutdownCoordinator::default();
        assert!(!coordinator.is_complete());
        coordinator.complete();
        tokio::time::timeout(Duration::from_secs(1), coordinator.wait_for_completion())
            .await
            .unwrap();
        assert!(coordinator.is_complete());
    }
}
