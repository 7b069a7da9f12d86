#![forbid(unsafe_code)]

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Bound on how long a stopping task may take to wind down.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A cancellable background task with a bounded join on stop.
pub(crate) struct BackgroundTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl BackgroundTask {
    pub(crate) fn new(cancel: CancellationToken, handle: JoinHandle<()>) -> Self {
        Self { cancel, handle }
    }

    /// Cancels the task and waits up to [`JOIN_TIMEOUT`], aborting it if
    /// it has not finished by then.
    pub(crate) async fn stop(self, name: &str) {
        self.cancel.cancel();
        let abort = self.handle.abort_handle();
        if tokio::time::timeout(JOIN_TIMEOUT, self.handle).await.is_err() {
            warn!(task = name, "background task did not stop in time, aborting");
            abort.abort();
        }
    }
}
