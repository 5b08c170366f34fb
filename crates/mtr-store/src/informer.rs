use std::sync::Arc;

use futures_util::StreamExt;
use mtr_schemas::{AnyObject, Kind};
use tokio::sync::{oneshot, watch};

use crate::{Cache, ResourceStore, StoreError, WatchEvent};

/// Keep `cache` in sync with `kind` in `store` and report every change.
///
/// The watch is opened before the initial listing so no write can fall in
/// between. `synced` fires once that listing is in the cache and has been
/// reported. `on_event` is called for every listed object, for every watch
/// event, and for every object of a relist after [`WatchEvent::Restart`].
///
/// Returns when `shutdown` flips to `true` or the watch stream ends.
pub async fn run_informer<F>(
    store: Arc<dyn ResourceStore>,
    kind: Kind,
    cache: Arc<Cache>,
    on_event: F,
    synced: oneshot::Sender<()>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), StoreError>
where
    F: Fn(&AnyObject) + Send + Sync,
{
    let mut events = store.watch(kind);

    let listed = cache.relist(store.as_ref(), kind).await?;
    tracing::debug!(kind = %kind, objects = listed.len(), "informer cache synced");
    listed.iter().for_each(&on_event);
    let _ = synced.send(());

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            ev = events.next() => {
                let Some(ev) = ev else {
                    tracing::warn!(kind = %kind, "watch stream closed");
                    break;
                };
                match &ev {
                    WatchEvent::Restart => {
                        tracing::warn!(kind = %kind, "watch lagged, relisting");
                        match cache.relist(store.as_ref(), kind).await {
                            Ok(listed) => listed.iter().for_each(&on_event),
                            Err(e) => {
                                tracing::error!(kind = %kind, error = %e, "relist failed");
                            }
                        }
                    }
                    other => {
                        cache.apply_event(other);
                        if let Some(obj) = other.object() {
                            on_event(obj);
                        }
                    }
                }
            }
        }
    }

    tracing::debug!(kind = %kind, "informer stopped");
    Ok(())
}
