//! mtr-store
//!
//! The Resource Store contract the reconciliation engine consumes, an
//! in-memory implementation of it, and the informer-side cache that sync
//! functions read from.
//!
//! The store is the single source of truth. Writes are optimistic: an update
//! carrying a stale `resource_version` fails with [`StoreError::Conflict`].

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use mtr_schemas::{AnyObject, Kind, ObjectKey};

mod cache;
mod error;
mod informer;
mod memory;

pub use cache::Cache;
pub use error::StoreError;
pub use informer::run_informer;
pub use memory::MemoryStore;

/// One change notification from [`ResourceStore::watch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Added(AnyObject),
    Modified(AnyObject),
    Deleted(AnyObject),
    /// Events may have been missed; the consumer must relist.
    Restart,
}

impl WatchEvent {
    pub fn object(&self) -> Option<&AnyObject> {
        match self {
            WatchEvent::Added(o) | WatchEvent::Modified(o) | WatchEvent::Deleted(o) => Some(o),
            WatchEvent::Restart => None,
        }
    }
}

pub type WatchStream = BoxStream<'static, WatchEvent>;

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Objects of `kind` in `namespace`, ordered by name.
    async fn list(&self, kind: Kind, namespace: &str) -> Result<Vec<AnyObject>, StoreError>;

    /// Objects of `kind` across all namespaces, ordered by key.
    async fn list_all(&self, kind: Kind) -> Result<Vec<AnyObject>, StoreError>;

    async fn get(&self, kind: Kind, key: &ObjectKey) -> Result<AnyObject, StoreError>;

    async fn create(&self, obj: AnyObject) -> Result<AnyObject, StoreError>;

    /// Compare-and-update: `obj.meta().resource_version` must match the
    /// stored version.
    async fn update(&self, obj: AnyObject) -> Result<AnyObject, StoreError>;

    async fn delete(&self, kind: Kind, key: &ObjectKey) -> Result<AnyObject, StoreError>;

    /// Change events for `kind` written after this call returns.
    fn watch(&self, kind: Kind) -> WatchStream;
}
