use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::WorkQueue;

/// One kind's reconciliation step, called with a `namespace/name` key.
#[async_trait]
pub trait SyncHandler: Send + Sync + 'static {
    type Error: Display + Send;

    async fn sync(&self, key: &str) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerOptions {
    pub workers: usize,
    /// Failed passes re-queued before the key is dropped.
    pub max_requeues: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Synced,
    Requeued { attempt: u32 },
    Dropped { attempts: u32 },
}

/// Start `opts.workers` loops draining `queue` into `handler`.
///
/// Each loop exits once the queue is shut down and its current pass has
/// finished.
pub fn spawn_workers<H: SyncHandler>(
    queue: WorkQueue,
    handler: Arc<H>,
    opts: WorkerOptions,
) -> Vec<JoinHandle<()>> {
    (0..opts.workers.max(1))
        .map(|worker| {
            let queue = queue.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                tracing::debug!(kind = %queue.name(), worker, "worker started");
                while let Some(key) = queue.get().await {
                    process_item(&queue, handler.as_ref(), &key, opts.max_requeues).await;
                }
                tracing::debug!(kind = %queue.name(), worker, "worker stopped");
            })
        })
        .collect()
}

/// Run one sync pass for a key already taken from `queue` and settle it:
/// forget on success, re-queue with backoff while under `max_requeues`,
/// otherwise drop. Always releases the key.
pub async fn process_item<H: SyncHandler + ?Sized>(
    queue: &WorkQueue,
    handler: &H,
    key: &str,
    max_requeues: u32,
) -> ItemOutcome {
    let span = tracing::info_span!("sync", kind = %queue.name(), key = %key, log_id = %log_id());
    let outcome = async {
        match handler.sync(key).await {
            Ok(()) => {
                queue.forget(key);
                ItemOutcome::Synced
            }
            Err(e) => {
                let attempts = queue.num_requeues(key);
                if attempts < max_requeues {
                    tracing::error!(
                        error = %e,
                        attempt = attempts + 1,
                        "error syncing {} {:?}, adding back to queue",
                        queue.name(),
                        key
                    );
                    queue.add_rate_limited(key);
                    ItemOutcome::Requeued {
                        attempt: attempts + 1,
                    }
                } else {
                    tracing::error!(
                        error = %e,
                        attempts,
                        "error syncing {} {:?}, dropping out of the queue",
                        queue.name(),
                        key
                    );
                    queue.forget(key);
                    ItemOutcome::Dropped { attempts }
                }
            }
        }
    }
    .instrument(span)
    .await;

    queue.done(key);
    outcome
}

fn log_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(10);
    id
}
