//! Informer: initial listing, live events and shutdown.
//!
//! GREEN when:
//! - objects present before start are cached and reported before `synced`
//!   is observed by the caller
//! - writes after start reach the cache and the callback
//! - deletes remove the object from the cache
//! - flipping the shutdown signal ends the informer

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mtr_schemas::{
    AnyObject, GenerationQuery, GenerationQuerySpec, Kind, ObjectKey, ObjectMeta, Resource,
};
use mtr_store::{run_informer, Cache, MemoryStore, ResourceStore};
use tokio::sync::{oneshot, watch};

fn gq(name: &str) -> AnyObject {
    GenerationQuery::new(
        ObjectMeta::new("ns", name),
        GenerationQuerySpec {
            query: "SELECT 1".to_string(),
            ..Default::default()
        },
    )
    .into_any()
}

async fn wait_for<F: Fn() -> bool>(cond: F) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn informer_lists_then_follows_events() {
    let store = Arc::new(MemoryStore::new());
    store.create(gq("before")).await.unwrap();

    let cache = Arc::new(Cache::new());
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let (synced_tx, synced_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let seen_cb = seen.clone();
    let handle = tokio::spawn(run_informer(
        store.clone() as Arc<dyn ResourceStore>,
        Kind::GenerationQuery,
        cache.clone(),
        move |obj: &AnyObject| seen_cb.lock().unwrap().push(obj.meta().name.clone()),
        synced_tx,
        shutdown_rx,
    ));

    synced_rx.await.unwrap();
    assert!(cache.get::<GenerationQuery>("ns", "before").is_some());

    store.create(gq("after")).await.unwrap();
    wait_for(|| cache.get::<GenerationQuery>("ns", "after").is_some()).await;

    store
        .delete(Kind::GenerationQuery, &ObjectKey::new("ns", "before"))
        .await
        .unwrap();
    wait_for(|| cache.get::<GenerationQuery>("ns", "before").is_none()).await;

    wait_for(|| seen.lock().unwrap().len() >= 3).await;
    assert_eq!(
        seen.lock().unwrap().clone(),
        vec!["before".to_string(), "after".to_string(), "before".to_string()]
    );

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn other_kinds_are_ignored() {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(Cache::new());
    let (synced_tx, synced_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let calls = Arc::new(Mutex::new(0usize));

    let calls_cb = calls.clone();
    let handle = tokio::spawn(run_informer(
        store.clone() as Arc<dyn ResourceStore>,
        Kind::DataSource,
        cache.clone(),
        move |_: &AnyObject| *calls_cb.lock().unwrap() += 1,
        synced_tx,
        shutdown_rx,
    ));
    synced_rx.await.unwrap();

    store.create(gq("a")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(*calls.lock().unwrap(), 0);
    assert!(cache.is_empty());

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}
