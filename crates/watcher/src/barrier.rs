//! Synchronization barrier for asynchronous-delivery backends
//!
//! `synchronize` guarantees that every mutation the OS notification layer
//! had already accepted is visible in the journal before the caller's next
//! query. The handshake: ask the backend to echo a flush marker through the
//! ordered event stream, then await the ingest pump observing it. The
//! configured timeout is a fallback bound for stalled backends, not the
//! primary mechanism.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{trace, warn};

use crate::{DeliveryMode, EventSource};

/// How a `synchronize` call ended. A timeout is not an error: the caller
/// proceeds with whatever state is currently visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// All previously accepted notifications are in the journal
    Synchronized,
    /// The backend did not drain within the configured bound
    TimedOut,
}

/// Per-mount barrier between "accepted by the OS" and "visible to queries"
pub struct SyncBarrier {
    source: Arc<dyn EventSource>,
    timeout: Duration,
    next_token: AtomicU64,
    pending: DashMap<u64, oneshot::Sender<()>>,
}

impl SyncBarrier {
    pub fn new(source: Arc<dyn EventSource>, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            next_token: AtomicU64::new(1),
            pending: DashMap::new(),
        }
    }

    /// Suspend until the event source has drained, or the timeout elapses.
    ///
    /// A no-op for synchronous-delivery backends. Cancellable: dropping the
    /// future abandons the wait, and the stale marker is reclaimed when it
    /// eventually arrives.
    pub async fn synchronize(&self) -> SyncOutcome {
        if self.source.delivery_mode() == DeliveryMode::Synchronous {
            return SyncOutcome::Synchronized;
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(token, tx);

        if let Err(e) = self.source.request_flush(token) {
            self.pending.remove(&token);
            warn!(error = %e, "event source rejected flush request");
            return SyncOutcome::TimedOut;
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(())) => {
                trace!(token, "flush marker observed");
                SyncOutcome::Synchronized
            }
            // Sender dropped or timer fired; either way the drain did not
            // complete in bounds
            _ => {
                self.pending.remove(&token);
                warn!(token, timeout = ?self.timeout, "synchronize timed out");
                SyncOutcome::TimedOut
            }
        }
    }

    /// Called by the ingest pump when a flush marker comes through the
    /// event stream.
    pub fn observe_marker(&self, token: u64) {
        if let Some((_, tx)) = self.pending.remove(&token) {
            // The waiter may have been cancelled; a dead receiver is fine
            let _ = tx.send(());
        }
    }

    /// Markers requested but not yet observed
    pub fn pending_markers(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ManualSource {
        mode: DeliveryMode,
        requested: Mutex<Vec<u64>>,
        fail_requests: bool,
    }

    impl ManualSource {
        fn new(mode: DeliveryMode) -> Self {
            Self {
                mode,
                requested: Mutex::new(Vec::new()),
                fail_requests: false,
            }
        }
    }

    impl EventSource for ManualSource {
        fn delivery_mode(&self) -> DeliveryMode {
            self.mode
        }

        fn request_flush(&self, token: u64) -> anyhow::Result<()> {
            if self.fail_requests {
                anyhow::bail!("backend gone");
            }
            self.requested.lock().unwrap().push(token);
            Ok(())
        }
    }

    #[tokio::test]
    async fn synchronous_backend_is_a_noop() {
        let source = Arc::new(ManualSource::new(DeliveryMode::Synchronous));
        let barrier = SyncBarrier::new(source.clone(), Duration::from_secs(5));
        assert_eq!(barrier.synchronize().await, SyncOutcome::Synchronized);
        assert!(source.requested.lock().unwrap().is_empty());
        assert_eq!(barrier.pending_markers(), 0);
    }

    #[tokio::test]
    async fn marker_echo_completes_the_wait() {
        let source = Arc::new(ManualSource::new(DeliveryMode::Coalesced));
        let barrier = Arc::new(SyncBarrier::new(source.clone(), Duration::from_secs(5)));

        let waiter = {
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move { barrier.synchronize().await })
        };
        // Let the waiter register its marker
        tokio::task::yield_now().await;
        let token = loop {
            if let Some(&t) = source.requested.lock().unwrap().first() {
                break t;
            }
            tokio::task::yield_now().await;
        };
        barrier.observe_marker(token);

        assert_eq!(waiter.await.unwrap(), SyncOutcome::Synchronized);
        assert_eq!(barrier.pending_markers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_backend_times_out() {
        let source = Arc::new(ManualSource::new(DeliveryMode::Coalesced));
        let barrier = SyncBarrier::new(source, Duration::from_millis(50));
        assert_eq!(barrier.synchronize().await, SyncOutcome::TimedOut);
        assert_eq!(barrier.pending_markers(), 0);
    }

    #[tokio::test]
    async fn failed_flush_request_degrades_to_timeout() {
        let mut source = ManualSource::new(DeliveryMode::Coalesced);
        source.fail_requests = true;
        let barrier = SyncBarrier::new(Arc::new(source), Duration::from_secs(5));
        assert_eq!(barrier.synchronize().await, SyncOutcome::TimedOut);
        assert_eq!(barrier.pending_markers(), 0);
    }

    #[tokio::test]
    async fn late_marker_after_cancellation_is_reclaimed() {
        let source = Arc::new(ManualSource::new(DeliveryMode::Coalesced));
        let barrier = Arc::new(SyncBarrier::new(source.clone(), Duration::from_secs(5)));

        let waiter = {
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move { barrier.synchronize().await })
        };
        tokio::task::yield_now().await;
        waiter.abort();
        let _ = waiter.await;

        let token = source.requested.lock().unwrap()[0];
        barrier.observe_marker(token);
        assert_eq!(barrier.pending_markers(), 0);
    }
}
