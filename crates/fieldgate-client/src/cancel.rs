// File: src/cancel.rs
// Purpose: Cooperative cancellation flag shared between a controller and its transport

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Set once by the controller when a newer request supersedes this one.
///
/// Transports check it before and after I/O; controllers check it again
/// before applying a result, so a late response is always dropped.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
