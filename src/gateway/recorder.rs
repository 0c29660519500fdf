//! Fire-and-forget attempt recording.

use crate::db::AttemptStore;
use crate::models::QueryAttempt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Writes attempts on background tasks so the response never waits on them.
#[derive(Debug, Clone)]
pub struct AttemptRecorder {
    store: Arc<dyn AttemptStore>,
}

impl AttemptRecorder {
    pub fn new(store: Arc<dyn AttemptStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn AttemptStore> {
        &self.store
    }

    /// Persist `attempt` on its own task.
    ///
    /// Failures are logged and dropped. The handle only exists so tests can
    /// wait for the write.
    pub fn record(&self, attempt: QueryAttempt) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            match store.insert(&attempt).await {
                Ok(()) => debug!(
                    attempt_id = %attempt.id,
                    assignment_id = %attempt.assignment_id,
                    "Recorded query attempt"
                ),
                Err(e) => warn!(
                    attempt_id = %attempt.id,
                    assignment_id = %attempt.assignment_id,
                    error = %e,
                    "Failed to record query attempt"
                ),
            }
        })
    }
}
