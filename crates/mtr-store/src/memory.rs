use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use mtr_schemas::{AnyObject, Kind, ObjectKey};
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::{ResourceStore, StoreError, WatchEvent, WatchStream};

const WATCH_BUFFER: usize = 1024;

/// In-process Resource Store.
///
/// Objects are kept in a single ordered map; every successful write bumps a
/// store-wide version counter and is broadcast to watchers. A watcher that
/// falls more than the buffer size behind receives [`WatchEvent::Restart`].
pub struct MemoryStore {
    inner: RwLock<Inner>,
    events: broadcast::Sender<WatchEvent>,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<(Kind, ObjectKey), AnyObject>,
    version: u64,
}

impl Inner {
    fn next_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _rx) = broadcast::channel(WATCH_BUFFER);
        Self {
            inner: RwLock::new(Inner::default()),
            events,
        }
    }

    /// Create `obj`, or replace the stored object's spec while keeping its
    /// status. This is how external actors (manifests, the HTTP surface)
    /// write: they own the spec, the operator owns the status.
    pub async fn apply(&self, mut obj: AnyObject) -> Result<AnyObject, StoreError> {
        validate(&obj)?;
        let id = (obj.kind(), obj.meta().key());
        let mut inner = self.inner.write().await;

        let Some(current) = inner.objects.get(&id).cloned() else {
            insert_new(&mut inner, &mut obj);
            self.publish(WatchEvent::Added(obj.clone()));
            drop(inner);
            return Ok(obj);
        };

        obj.copy_status_from(&current);
        {
            let cur = current.meta();
            let meta = obj.meta_mut();
            meta.uid = cur.uid;
            meta.creation_timestamp = cur.creation_timestamp;
            meta.resource_version = cur.resource_version;
        }
        if obj == current {
            return Ok(current);
        }
        obj.meta_mut().resource_version = inner.next_version();
        inner.objects.insert(id, obj.clone());
        self.publish(WatchEvent::Modified(obj.clone()));
        drop(inner);
        Ok(obj)
    }

    /// Number of objects of every kind.
    pub async fn len(&self) -> usize {
        self.inner.read().await.objects.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Called with the write guard held, so watchers see events in commit
    /// order.
    fn publish(&self, ev: WatchEvent) {
        // No receivers is fine: nobody is watching yet.
        let _ = self.events.send(ev);
    }
}

fn validate(obj: &AnyObject) -> Result<(), StoreError> {
    let meta = obj.meta();
    if meta.name.is_empty() {
        return Err(StoreError::Invalid("metadata.name is required".to_string()));
    }
    if meta.name.contains('/') || meta.namespace.contains('/') {
        return Err(StoreError::Invalid(format!(
            "namespace and name must not contain '/': {}",
            meta.key()
        )));
    }
    Ok(())
}

fn insert_new(inner: &mut Inner, obj: &mut AnyObject) {
    let version = inner.next_version();
    let meta = obj.meta_mut();
    meta.uid = Some(Uuid::new_v4());
    meta.resource_version = version;
    meta.creation_timestamp = Some(Utc::now());
    inner
        .objects
        .insert((obj.kind(), obj.meta().key()), obj.clone());
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn list(&self, kind: Kind, namespace: &str) -> Result<Vec<AnyObject>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .objects
            .iter()
            .filter(|((k, key), _)| *k == kind && key.namespace == namespace)
            .map(|(_, o)| o.clone())
            .collect())
    }

    async fn list_all(&self, kind: Kind) -> Result<Vec<AnyObject>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .objects
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, o)| o.clone())
            .collect())
    }

    async fn get(&self, kind: Kind, key: &ObjectKey) -> Result<AnyObject, StoreError> {
        let inner = self.inner.read().await;
        inner
            .objects
            .get(&(kind, key.clone()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind,
                key: key.clone(),
            })
    }

    async fn create(&self, mut obj: AnyObject) -> Result<AnyObject, StoreError> {
        validate(&obj)?;
        let kind = obj.kind();
        let key = obj.meta().key();
        let mut inner = self.inner.write().await;
        if inner.objects.contains_key(&(kind, key.clone())) {
            return Err(StoreError::AlreadyExists { kind, key });
        }

        insert_new(&mut inner, &mut obj);
        self.publish(WatchEvent::Added(obj.clone()));
        drop(inner);
        Ok(obj)
    }

    async fn update(&self, mut obj: AnyObject) -> Result<AnyObject, StoreError> {
        let kind = obj.kind();
        let key = obj.meta().key();
        let mut inner = self.inner.write().await;
        let Some(current) = inner.objects.get(&(kind, key.clone())) else {
            return Err(StoreError::NotFound { kind, key });
        };

        let actual = current.meta().resource_version;
        let expected = obj.meta().resource_version;
        if expected != actual {
            return Err(StoreError::Conflict {
                kind,
                key,
                expected,
                actual,
            });
        }

        let (uid, created) = (current.meta().uid, current.meta().creation_timestamp);
        let version = inner.next_version();
        let meta = obj.meta_mut();
        meta.uid = uid;
        meta.creation_timestamp = created;
        meta.resource_version = version;
        inner.objects.insert((kind, key), obj.clone());
        self.publish(WatchEvent::Modified(obj.clone()));
        drop(inner);
        Ok(obj)
    }

    async fn delete(&self, kind: Kind, key: &ObjectKey) -> Result<AnyObject, StoreError> {
        let mut inner = self.inner.write().await;
        let removed = inner
            .objects
            .remove(&(kind, key.clone()))
            .ok_or_else(|| StoreError::NotFound {
                kind,
                key: key.clone(),
            })?;
        self.publish(WatchEvent::Deleted(removed.clone()));
        drop(inner);
        Ok(removed)
    }

    fn watch(&self, kind: Kind) -> WatchStream {
        BroadcastStream::new(self.events.subscribe())
            .filter_map(move |res| async move {
                match res {
                    Ok(WatchEvent::Restart) => Some(WatchEvent::Restart),
                    Ok(ev) => ev
                        .object()
                        .is_some_and(|o| o.kind() == kind)
                        .then_some(ev),
                    Err(BroadcastStreamRecvError::Lagged(_)) => Some(WatchEvent::Restart),
                }
            })
            .boxed()
    }
}
