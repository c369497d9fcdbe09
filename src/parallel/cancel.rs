use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Handle for cancelling a whole run.
///
/// Clones share one flag. Workers poll it while their child process runs
/// and the orchestrator checks it between rounds.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; in-flight tools are killed at their next poll.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
