//! Cooperative cancellation shared between the caller and in-flight chains

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Cloneable cancellation flag.
///
/// Chains check it before each step; no new (resource, step) pair is
/// dispatched once it is set.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; idempotent
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation is requested
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
