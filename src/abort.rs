use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One-way stop signal shared by the caller and every scan worker.
///
/// The flag starts cleared and can only be raised. Workers poll it between
/// decode blocks and before a new track starts; nothing ever waits on it.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Raising an already raised flag is harmless.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
