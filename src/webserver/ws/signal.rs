/// One-shot latch shared between tasks
///
/// Used for the hub-wide cancellation signal and for the per-connection
/// close request. Triggering is idempotent: the first caller flips the
/// latch, later callers are no-ops. Waiters that subscribe after the
/// trigger return immediately.
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct Signal {
    tx: Arc<watch::Sender<bool>>,
}

impl Signal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Flip the latch. Returns true only for the caller that flipped it.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|triggered| {
            if *triggered {
                false
            } else {
                *triggered = true;
                true
            }
        })
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the latch is triggered
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so wait_for only returns once triggered
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}
