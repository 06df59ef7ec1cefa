use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{PlannerError, Result};

/// Shared cancellation flag checked at document and pair granularity.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(Cancelled)` once [`cancel`](Self::cancel) has been called.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PlannerError::Cancelled)
        } else {
            Ok(())
        }
    }
}
