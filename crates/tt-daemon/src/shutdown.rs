use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// ShutdownSignal: cooperative shutdown coordination
// ---------------------------------------------------------------------------

/// Shutdown coordinator shared by the signal handler and the server.
///
/// Backed by a watch channel, so a waiter that starts after
/// [`trigger`](Self::trigger) still observes the shutdown.
///
/// ```ignore
/// let shutdown = ShutdownSignal::new();
/// axum::serve(listener, router)
///     .with_graceful_shutdown(shutdown.clone().wait())
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Check if shutdown has been triggered (non-blocking).
    pub fn is_shutting_down(&self) -> bool {
        *self.rx.borrow()
    }

    /// Trigger shutdown for every waiter. Repeated calls are no-ops.
    pub fn trigger(&self) {
        let first = self.tx.send_if_modified(|down| !std::mem::replace(down, true));
        if first {
            info!("shutdown signal triggered");
        } else {
            warn!("shutdown already triggered");
        }
    }

    /// Resolve once shutdown has been triggered.
    pub async fn wait(mut self) {
        // The sender lives in `self`, so `wait_for` cannot fail here.
        let _ = self.rx.wait_for(|down| *down).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_waiters() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_shutting_down());

        let waiter = tokio::spawn(signal.clone().wait());
        signal.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .unwrap();
        assert!(signal.is_shutting_down());
    }

    #[tokio::test]
    async fn test_late_waiter_sees_earlier_trigger() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        signal.trigger();

        tokio::time::timeout(Duration::from_secs(1), signal.clone().wait())
            .await
            .expect("already shut down");
    }
}
