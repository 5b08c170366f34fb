use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use mtr_schemas::{AnyObject, Kind, ObjectKey, Resource};

use crate::{ResourceStore, StoreError, WatchEvent};

type Objects = BTreeMap<(Kind, ObjectKey), AnyObject>;

/// Informer-side read model of the store.
///
/// Sync functions read only from here; they never list the store directly
/// except during propagation. Reads are synchronous so the dependency
/// resolver can stay free of IO.
#[derive(Default)]
pub struct Cache {
    objects: RwLock<Objects>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relist every kind from `store`.
    pub async fn resync(&self, store: &dyn ResourceStore) -> Result<(), StoreError> {
        for kind in Kind::ALL {
            self.relist(store, kind).await?;
        }
        Ok(())
    }

    /// Replace the cached objects of `kind` with a fresh listing. Returns the
    /// listed objects.
    pub async fn relist(
        &self,
        store: &dyn ResourceStore,
        kind: Kind,
    ) -> Result<Vec<AnyObject>, StoreError> {
        let listed = store.list_all(kind).await?;
        let mut objects = self.write();
        objects.retain(|(k, _), _| *k != kind);
        for obj in &listed {
            objects.insert((kind, obj.meta().key()), obj.clone());
        }
        Ok(listed)
    }

    pub fn apply_event(&self, ev: &WatchEvent) {
        match ev {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) => {
                let id = (obj.kind(), obj.meta().key());
                let mut objects = self.write();
                let stale = objects
                    .get(&id)
                    .is_some_and(|cur| cur.meta().resource_version > obj.meta().resource_version);
                if !stale {
                    objects.insert(id, obj.clone());
                }
            }
            WatchEvent::Deleted(obj) => {
                self.write().remove(&(obj.kind(), obj.meta().key()));
            }
            WatchEvent::Restart => {}
        }
    }

    pub fn get_any(&self, kind: Kind, key: &ObjectKey) -> Option<AnyObject> {
        self.read().get(&(kind, key.clone())).cloned()
    }

    pub fn get<T: Resource>(&self, namespace: &str, name: &str) -> Option<T> {
        self.get_any(T::KIND, &ObjectKey::new(namespace, name))
            .and_then(|o| T::from_any(o).ok())
    }

    /// Objects of type `T` in `namespace`, ordered by name.
    pub fn list<T: Resource>(&self, namespace: &str) -> Vec<T> {
        self.read()
            .iter()
            .filter(|((k, key), _)| *k == T::KIND && key.namespace == namespace)
            .filter_map(|(_, o)| T::from_any(o.clone()).ok())
            .collect()
    }

    pub fn len(&self, kind: Kind) -> usize {
        self.read().keys().filter(|(k, _)| *k == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panicking writer cannot leave a half-applied map behind: every write
    // is a single insert/remove/retain, so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, Objects> {
        self.objects.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Objects> {
        self.objects.write().unwrap_or_else(|e| e.into_inner())
    }
}
