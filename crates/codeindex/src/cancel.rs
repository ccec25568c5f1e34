use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between an indexer and its callers.
///
/// The indexer checks the flag before preparing each unit and before
/// applying each prepared unit to the graph. Once set it stays set until
/// [`reset`](Self::reset).
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the running (or next) scan.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the next scan runs.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
