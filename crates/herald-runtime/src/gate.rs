//! Re-entrancy guard for timer-driven cycles.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Each periodic cycle holds this gate for its duration; if the previous
/// run of the same cycle is still in flight the next tick is skipped
/// instead of overlapping it.
#[derive(Default)]
pub struct CycleGate {
    lock: Arc<Mutex<()>>,
}

impl CycleGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking: `None` means the previous cycle is still running. The
    /// guard is owned so a cycle can carry it into a spawned task.
    pub fn try_enter(&self) -> Option<OwnedMutexGuard<()>> {
        self.lock.clone().try_lock_owned().ok()
    }
}
