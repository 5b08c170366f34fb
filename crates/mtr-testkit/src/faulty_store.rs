use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mtr_schemas::{AnyObject, Kind, ObjectKey};
use mtr_store::{ResourceStore, StoreError, WatchStream};

/// Wraps a store and injects failures.
///
/// Watch and get are always passed through; list and update can be made
/// to fail a given number of times, and both are counted.
pub struct FaultyStore {
    inner: Arc<dyn ResourceStore>,
    list_failures: Mutex<BTreeMap<Kind, usize>>,
    update_conflicts: Mutex<usize>,
    update_calls: Mutex<usize>,
    list_calls: Mutex<usize>,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn ResourceStore>) -> Self {
        Self {
            inner,
            list_failures: Mutex::default(),
            update_conflicts: Mutex::default(),
            update_calls: Mutex::default(),
            list_calls: Mutex::default(),
        }
    }

    /// Fail the next `times` namespace listings of `kind`.
    pub fn fail_list(&self, kind: Kind, times: usize) {
        self.list_failures.lock().unwrap().insert(kind, times);
    }

    /// Reject the next `times` updates with a conflict, as if another
    /// writer got there first.
    pub fn conflict_updates(&self, times: usize) {
        *self.update_conflicts.lock().unwrap() = times;
    }

    /// Updates attempted, including rejected ones.
    pub fn update_calls(&self) -> usize {
        *self.update_calls.lock().unwrap()
    }

    /// Namespace listings attempted, including failed ones.
    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }

    fn take(counter: &mut usize) -> bool {
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl ResourceStore for FaultyStore {
    async fn list(&self, kind: Kind, namespace: &str) -> Result<Vec<AnyObject>, StoreError> {
        *self.list_calls.lock().unwrap() += 1;
        let fail = {
            let mut failures = self.list_failures.lock().unwrap();
            failures.get_mut(&kind).is_some_and(Self::take)
        };
        if fail {
            return Err(StoreError::Unavailable(format!("injected list failure for {kind}")));
        }
        self.inner.list(kind, namespace).await
    }

    async fn list_all(&self, kind: Kind) -> Result<Vec<AnyObject>, StoreError> {
        self.inner.list_all(kind).await
    }

    async fn get(&self, kind: Kind, key: &ObjectKey) -> Result<AnyObject, StoreError> {
        self.inner.get(kind, key).await
    }

    async fn create(&self, obj: AnyObject) -> Result<AnyObject, StoreError> {
        self.inner.create(obj).await
    }

    async fn update(&self, obj: AnyObject) -> Result<AnyObject, StoreError> {
        *self.update_calls.lock().unwrap() += 1;
        let conflict = Self::take(&mut self.update_conflicts.lock().unwrap());
        if conflict {
            let version = obj.meta().resource_version;
            return Err(StoreError::Conflict {
                kind: obj.kind(),
                key: obj.meta().key(),
                expected: version,
                actual: version + 1,
            });
        }
        self.inner.update(obj).await
    }

    async fn delete(&self, kind: Kind, key: &ObjectKey) -> Result<AnyObject, StoreError> {
        self.inner.delete(kind, key).await
    }

    fn watch(&self, kind: Kind) -> WatchStream {
        self.inner.watch(kind)
    }
}
