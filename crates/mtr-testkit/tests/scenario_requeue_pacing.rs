//! Objects that can never become ready must not spin the worker pools.
//!
//! GREEN when:
//! - a query depending on a query with its view disabled keeps deferring
//!   at the defer rate, and the disabled query is not re-run
//! - a query listing a report built from itself is a cycle: nothing
//!   materializes and the report's table never bounces the pair between
//!   queues
//! - each key holds at most one pending delayed add

use std::sync::Arc;
use std::time::Duration;

use mtr_operator::Reporting;
use mtr_schemas::{AnyObject, GenerationQuery, Kind, ObjectKey, Resource};
use mtr_store::{MemoryStore, ResourceStore};
use mtr_testkit::{
    generation_query, report, test_config, FaultyStore, RecordingViewCreator, TEST_NAMESPACE,
};
use tokio::sync::watch;

const WINDOW: Duration = Duration::from_millis(300);

struct Paced {
    store: Arc<FaultyStore>,
    views: Arc<RecordingViewCreator>,
}

/// Run the operator over `objects` for [`WINDOW`], then stop it.
async fn run_for_window(objects: Vec<AnyObject>) -> Paced {
    let memory = Arc::new(MemoryStore::new());
    for obj in objects {
        memory.create(obj).await.unwrap();
    }
    let store = Arc::new(FaultyStore::new(memory));
    let views = Arc::new(RecordingViewCreator::new());
    let mut cfg = test_config();
    cfg.requeue.dependency_defer_ms = 50;
    let op = Arc::new(Reporting::new(cfg, store.clone(), views.clone()));

    let (shutdown, rx) = watch::channel(false);
    let handle = tokio::spawn(op.clone().run(rx));
    tokio::time::sleep(WINDOW).await;

    for kind in Kind::ALL {
        assert!(
            op.queues().get(kind).waiting() <= 2,
            "{kind} holds {} delayed adds",
            op.queues().get(kind).waiting()
        );
    }

    shutdown.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("operator did not shut down")
        .unwrap()
        .unwrap();
    Paced { store, views }
}

async fn view_name(store: &FaultyStore, name: &str) -> Option<String> {
    let obj = store
        .get(Kind::GenerationQuery, &ObjectKey::new(TEST_NAMESPACE, name))
        .await
        .ok()?;
    GenerationQuery::from_any(obj).ok()?.status.view_name
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn disabled_view_dependency_does_not_spin() {
    let p = run_for_window(vec![
        generation_query("A", "SELECT 1").view_disabled().build().into_any(),
        generation_query("B", "SELECT 2").report_queries(&["A"]).build().into_any(),
    ])
    .await;

    assert!(p.views.calls().is_empty());
    assert!(view_name(&p.store, "B").await.is_none());
    // each pass of A lists three dependent kinds; only its startup passes
    // may have run
    assert!(
        p.store.list_calls() <= 6,
        "A re-ran {} listings in {WINDOW:?}",
        p.store.list_calls()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn report_built_from_its_dependent_does_not_spin() {
    let p = run_for_window(vec![
        generation_query("B", "SELECT 1").reports(&["daily"]).build().into_any(),
        report("daily", "B", Some("report_daily")).into_any(),
    ])
    .await;

    assert!(p.views.calls().is_empty());
    assert!(view_name(&p.store, "B").await.is_none());
    // the report never sees a view, so never propagates its table
    assert_eq!(p.store.list_calls(), 0);
}
