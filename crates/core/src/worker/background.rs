//! Fire-and-forget work that outlives the response it belongs to.

use std::future::Future;

use tokio::task::JoinHandle;

/// Handle to a detached task such as a post-fetch cache write.
///
/// Dropping the handle leaves the task running. Tests call [`wait`] to
/// observe the side effect deterministically.
///
/// [`wait`]: BackgroundTask::wait
#[derive(Debug)]
#[must_use = "drop the handle to detach, or call wait() to observe completion"]
pub struct BackgroundTask {
    handle: JoinHandle<()>,
}

impl BackgroundTask {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self { handle: tokio::spawn(future) }
    }

    /// Wait for the task to finish. A panicked task is logged, not propagated.
    pub async fn wait(self) {
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "background task did not complete");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
