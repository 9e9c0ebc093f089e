//! crates/course_sync_core/src/cleanup.rs
//!
//! The cleanup executor. Asset deletions are queued as intents and consumed by
//! a dedicated worker task that retries each one with exponential backoff.
//! Queueing never blocks and never fails the request that produced the intent.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::ports::{AssetStore, PortError};

/// Why an asset is being deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupReason {
    /// Replaced or dropped by a successful update.
    Orphaned,
    /// Written during a request that was then rejected.
    Rollback,
    /// Referenced by a course that was deleted.
    CourseDeleted,
}

#[derive(Debug, Clone)]
pub struct DeletionIntent {
    pub path: String,
    pub reason: CleanupReason,
}

#[derive(Debug, Clone, Copy)]
pub struct CleanupSettings {
    pub max_attempts: u32,
    /// Delay before the first retry; doubled on every further retry.
    pub backoff: Duration,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

enum Command {
    Delete(DeletionIntent),
    Flush(oneshot::Sender<()>),
}

/// Sending half of the cleanup queue. Cheap to clone.
#[derive(Clone)]
pub struct CleanupQueue {
    tx: mpsc::UnboundedSender<Command>,
}

impl CleanupQueue {
    pub fn enqueue<I>(&self, paths: I, reason: CleanupReason)
    where
        I: IntoIterator<Item = String>,
    {
        for path in paths {
            if self
                .tx
                .send(Command::Delete(DeletionIntent { path, reason }))
                .is_err()
            {
                warn!(?reason, "Cleanup worker is gone; deletion intent dropped");
                return;
            }
        }
    }

    /// Resolves once every intent queued before this call has been processed.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

/// Receiving half of the cleanup queue; run it on its own task.
pub struct CleanupWorker {
    rx: mpsc::UnboundedReceiver<Command>,
    assets: Arc<dyn AssetStore>,
    settings: CleanupSettings,
    shutdown: CancellationToken,
}

/// Creates a connected queue and worker.
pub fn cleanup_channel(
    assets: Arc<dyn AssetStore>,
    settings: CleanupSettings,
    shutdown: CancellationToken,
) -> (CleanupQueue, CleanupWorker) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        CleanupQueue { tx },
        CleanupWorker {
            rx,
            assets,
            settings,
            shutdown,
        },
    )
}

impl CleanupWorker {
    /// Processes intents until every queue handle is dropped or shutdown is
    /// requested. On shutdown, whatever is already queued is still processed.
    pub async fn run(mut self) {
        info!("Cleanup worker started");
        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = self.shutdown.cancelled() => {
                    while let Ok(command) = self.rx.try_recv() {
                        self.handle(command).await;
                    }
                    break;
                }
            }
        }
        info!("Cleanup worker stopped");
    }

    async fn handle(&self, command: Command) {
        match command {
            Command::Delete(intent) => {
                self.delete_with_retry(&intent).await;
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    async fn delete_with_retry(&self, intent: &DeletionIntent) {
        let max_attempts = self.settings.max_attempts.max(1);
        for attempt in 0..max_attempts {
            match self.assets.delete(&intent.path).await {
                Ok(()) => {
                    debug!(path = %intent.path, reason = ?intent.reason, "Asset deleted");
                    return;
                }
                Err(e @ PortError::InvalidInput(_)) => {
                    error!(path = %intent.path, reason = ?intent.reason, error = %e, "Asset deletion rejected; not retrying");
                    return;
                }
                Err(e) if attempt + 1 < max_attempts => {
                    let delay = self.settings.backoff * 2u32.saturating_pow(attempt);
                    warn!(path = %intent.path, attempt = attempt + 1, error = %e, "Asset deletion failed; retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(path = %intent.path, reason = ?intent.reason, error = %e, "Giving up on asset deletion");
                }
            }
        }
    }
}
