use std::collections::BTreeMap;
use std::sync::Arc;

use mtr_config::OperatorConfig;
use mtr_queue::{spawn_workers, WorkerOptions};
use mtr_schemas::{AnyObject, Kind};
use mtr_store::{run_informer, Cache, ResourceStore, StoreError};
use mtr_view::{QueryRenderer, ViewCreator};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::sync::KindHandler;
use crate::Queues;

/// The reconciliation engine for one operator process.
pub struct Reporting {
    pub(crate) cfg: OperatorConfig,
    pub(crate) store: Arc<dyn ResourceStore>,
    pub(crate) cache: Arc<Cache>,
    pub(crate) views: Arc<dyn ViewCreator>,
    pub(crate) renderer: QueryRenderer,
    pub(crate) queues: Queues,
}

impl Reporting {
    pub fn new(
        cfg: OperatorConfig,
        store: Arc<dyn ResourceStore>,
        views: Arc<dyn ViewCreator>,
    ) -> Self {
        let queues = Queues::new(&cfg.requeue);
        Self {
            cfg,
            store,
            cache: Arc::new(Cache::new()),
            views,
            renderer: QueryRenderer::new(),
            queues,
        }
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.cfg
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    pub fn queues(&self) -> &Queues {
        &self.queues
    }

    pub fn queue_depths(&self) -> BTreeMap<Kind, usize> {
        self.queues.depths()
    }

    /// Queue `obj` on its kind's queue, if its namespace is watched.
    pub fn enqueue(&self, obj: &AnyObject) {
        let meta = obj.meta();
        if !self.cfg.watches_namespace(&meta.namespace) {
            return;
        }
        self.queues.add(obj.kind(), &meta.key());
    }

    /// Run informers and worker pools until `shutdown` becomes `true`.
    ///
    /// Workers start only once every informer has its initial listing.
    /// On shutdown, queues stop handing out keys and in-flight passes run
    /// to completion before this returns.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<(), StoreError> {
        let mut informers: Vec<(Kind, JoinHandle<Result<(), StoreError>>)> = Vec::new();
        let mut synced = Vec::new();

        for kind in Kind::ALL {
            let (tx, rx) = oneshot::channel();
            let op = self.clone();
            let handle = tokio::spawn(run_informer(
                self.store.clone(),
                kind,
                self.cache.clone(),
                move |obj: &AnyObject| op.enqueue(obj),
                tx,
                shutdown.clone(),
            ));
            informers.push((kind, handle));
            synced.push(rx);
        }

        for (i, rx) in synced.into_iter().enumerate() {
            if rx.await.is_err() {
                let (kind, handle) = informers.swap_remove(i);
                for (_, other) in &informers {
                    other.abort();
                }
                tracing::error!(kind = %kind, "informer failed before cache sync");
                return match handle.await {
                    Ok(Err(e)) => Err(e),
                    Ok(Ok(())) => Err(StoreError::Unavailable(format!(
                        "{kind} informer stopped before cache sync"
                    ))),
                    Err(e) => Err(StoreError::Unavailable(format!("{kind} informer: {e}"))),
                };
            }
        }
        tracing::info!("caches synced, starting workers");

        let mut workers = Vec::new();
        for kind in Kind::ALL {
            let opts = WorkerOptions {
                workers: self.cfg.workers.get(kind),
                max_requeues: self.cfg.max_requeues.get(kind),
            };
            tracing::info!(kind = %kind, workers = opts.workers, max_requeues = opts.max_requeues, "starting workers");
            let handler = Arc::new(KindHandler::new(self.clone(), kind));
            workers.extend(spawn_workers(self.queues.get(kind).clone(), handler, opts));
        }

        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }
        tracing::info!("shutting down workers");

        self.queues.shut_down();
        for w in workers {
            if let Err(e) = w.await {
                tracing::error!(error = %e, "worker task failed");
            }
        }
        for (kind, handle) in informers {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(kind = %kind, error = %e, "informer ended with error"),
                Err(e) => tracing::error!(kind = %kind, error = %e, "informer task failed"),
            }
        }
        tracing::info!("reconciliation stopped");
        Ok(())
    }
}
