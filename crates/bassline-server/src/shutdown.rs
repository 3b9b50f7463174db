//! Graceful shutdown and connection accounting.
//!
//! ```rust
//! use bassline_server::ShutdownSignal;
//!
//! # tokio_test::block_on(async {
//! let shutdown = ShutdownSignal::new();
//! let waiter = shutdown.clone();
//!
//! shutdown.trigger();
//! waiter.recv().await;
//! assert!(waiter.is_shutdown());
//! # });
//! ```

use std::sync::Arc;

use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};

/// A cloneable, one-way shutdown flag.
///
/// Every clone observes the same flag; once triggered it stays triggered.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Triggers shutdown. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Returns `true` once triggered.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    /// Completes when shutdown is triggered, immediately if it already was.
    pub async fn recv(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives in self, so the channel cannot close here
        let _ = rx.wait_for(|triggered| *triggered).await;
    }

    /// Creates a signal triggered by SIGTERM or SIGINT.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn with_os_signals() -> Self {
        let signal = Self::new();
        let trigger = signal.clone();

        tokio::spawn(async move {
            wait_for_os_signal().await;
            trigger.trigger();
        });

        signal
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn wait_for_os_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(error = %e, "cannot register signal handlers; falling back to Ctrl+C");
            wait_for_ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_os_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C, shutting down"),
        Err(e) => {
            // never trigger on a broken signal source
            tracing::error!(error = %e, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

/// Caps concurrent connections and lets shutdown wait for them to drain.
///
/// ```rust
/// use bassline_server::ConnectionLimiter;
///
/// # tokio_test::block_on(async {
/// let limiter = ConnectionLimiter::new(2);
/// let permit = limiter.acquire().await.unwrap();
/// assert_eq!(limiter.active(), 1);
///
/// drop(permit);
/// limiter.wait_idle().await;
/// assert_eq!(limiter.active(), 0);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionLimiter {
    permits: Arc<Semaphore>,
    max: usize,
}

impl ConnectionLimiter {
    /// Allows up to `max` connections (at least one).
    #[must_use]
    pub fn new(max: usize) -> Self {
        let max = max.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            permits: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    /// Waits for a free slot. The slot is released when the permit drops.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.permits).acquire_owned().await.ok()
    }

    /// Number of connections currently holding a slot.
    #[must_use]
    pub fn active(&self) -> usize {
        self.max - self.permits.available_permits()
    }

    /// Completes once every slot is free.
    pub async fn wait_idle(&self) {
        let all = u32::try_from(self.max).unwrap_or(u32::MAX);
        if let Ok(permits) = self.permits.acquire_many(all).await {
            drop(permits);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_trigger_is_idempotent() {
        let shutdown = ShutdownSignal::new();
        assert!(!shutdown.is_shutdown());
        shutdown.trigger();
        shutdown.trigger();
        assert!(shutdown.is_shutdown());
    }

    #[tokio::test]
    async fn test_recv_after_trigger_completes() {
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), shutdown.recv())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_clones_are_notified() {
        let shutdown = ShutdownSignal::new();
        let waiter = shutdown.clone();
        let task = tokio::spawn(async move { waiter.recv().await });

        tokio::task::yield_now().await;
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_limiter_blocks_at_capacity() {
        let limiter = ConnectionLimiter::new(1);
        let held = limiter.acquire().await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(20), limiter.acquire()).await;
        assert!(blocked.is_err());

        drop(held);
        assert!(limiter.acquire().await.is_some());
    }

    #[tokio::test]
    async fn test_wait_idle_waits_for_release() {
        let limiter = ConnectionLimiter::new(4);
        let permit = limiter.acquire().await.unwrap();
        assert_eq!(limiter.active(), 1);

        let still_busy = tokio::time::timeout(Duration::from_millis(20), limiter.wait_idle()).await;
        assert!(still_busy.is_err());

        drop(permit);
        tokio::time::timeout(Duration::from_secs(1), limiter.wait_idle())
            .await
            .unwrap();
    }
}
