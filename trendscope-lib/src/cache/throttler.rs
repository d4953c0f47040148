use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds how many producers run at the same time.
///
/// A producer holds its permit until it finishes.
#[derive(Debug)]
pub struct Throttler {
    slots: Arc<Semaphore>,
}

impl Throttler {
    /// Allow at most `max_concurrent` producers, and never fewer than one.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Wait for a free slot. `None` means the slots have been closed.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.slots).acquire_owned().await.ok()
    }

    /// Number of producers that could start right now.
    #[must_use]
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}
