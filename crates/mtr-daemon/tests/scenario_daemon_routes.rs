//! In-process scenario tests for mtr-daemon HTTP endpoints.
//!
//! The Axum router is driven through `tower::ServiceExt::oneshot` without
//! binding a socket.
//!
//! GREEN when:
//! - health and status answer 200; status carries config hash and per-kind
//!   queue depths
//! - objects can be listed, read, applied and deleted by namespace/kind/name
//! - applying keeps the operator-owned status
//! - unknown kinds are 404, mismatched bodies 400, missing objects 404
//! - with the engine running, a GenerationQuery applied over HTTP gets its
//!   view materialized

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use mtr_daemon::{routes, state::AppState};
use mtr_operator::Reporting;
use mtr_schemas::{Kind, ObjectKey, Resource};
use mtr_store::{MemoryStore, ResourceStore};
use mtr_testkit::{generation_query, test_config, wait_until, RecordingViewCreator};
use serde_json::{json, Value};
use tokio::sync::watch;
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    router: axum::Router,
    op: Arc<Reporting>,
    store: Arc<MemoryStore>,
    views: Arc<RecordingViewCreator>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let views = Arc::new(RecordingViewCreator::new());
    let op = Arc::new(Reporting::new(test_config(), store.clone(), views.clone()));
    let st = Arc::new(AppState::new(op.clone(), store.clone(), "abc123".to_string()));
    Harness {
        router: routes::build_router(st),
        op,
        store,
        views,
    }
}

async fn call(router: &axum::Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = router.clone().oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn put(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn parse_json(b: Bytes) -> Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn query_body(name: &str, query: &str) -> Value {
    json!({
        "kind": "GenerationQuery",
        "metadata": { "name": name },
        "spec": { "query": query }
    })
}

// ---------------------------------------------------------------------------
// GET /v1/health, /v1/status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let h = harness();
    let (status, body) = call(&h.router, get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "mtr-daemon");
}

#[tokio::test]
async fn status_reports_config_hash_and_queue_depths() {
    let h = harness();
    h.op.queues()
        .add(Kind::Report, &ObjectKey::new("metering", "daily"));

    let (status, body) = call(&h.router, get("/v1/status")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["config_hash"], "abc123");
    assert_eq!(json["namespace"], Value::Null);
    assert_eq!(json["queue_depths"]["Report"], 1);
    assert_eq!(json["queue_depths"]["GenerationQuery"], 0);
    assert_eq!(json["objects"], 0);
}

// ---------------------------------------------------------------------------
// /v1/namespaces/{ns}/{kind}[/{name}]
// ---------------------------------------------------------------------------

#[tokio::test]
async fn put_then_get_and_list() {
    let h = harness();
    let (status, body) = call(
        &h.router,
        put(
            "/v1/namespaces/metering/generationqueries/pod-usage",
            query_body("pod-usage", "SELECT 1"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
    let stored = parse_json(body);
    assert_eq!(stored["metadata"]["namespace"], "metering");
    assert_eq!(stored["metadata"]["resourceVersion"], 1);

    let (status, body) = call(
        &h.router,
        get("/v1/namespaces/metering/GenerationQuery/pod-usage"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["spec"]["query"], "SELECT 1");

    let (status, body) = call(&h.router, get("/v1/namespaces/metering/generationqueries")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["kind"], "GenerationQuery");
    assert_eq!(json["items"].as_array().map(Vec::len), Some(1));

    let (_, body) = call(&h.router, get("/v1/namespaces/other/generationqueries")).await;
    assert_eq!(parse_json(body)["items"], json!([]));
}

#[tokio::test]
async fn put_keeps_operator_status() {
    let h = harness();
    h.store
        .create(
            generation_query("pod-usage", "SELECT 1")
                .view_name("view_pod_usage")
                .build()
                .into_any(),
        )
        .await
        .unwrap();

    let (status, body) = call(
        &h.router,
        put(
            "/v1/namespaces/metering/generationqueries/pod-usage",
            query_body("pod-usage", "SELECT 2"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["spec"]["query"], "SELECT 2");
    assert_eq!(json["status"]["viewName"], "view_pod_usage");
}

#[tokio::test]
async fn delete_removes_object_then_404() {
    let h = harness();
    let uri = "/v1/namespaces/metering/datasources/pods";
    let body = json!({
        "kind": "DataSource",
        "metadata": { "namespace": "metering", "name": "pods" },
        "spec": { "source": "prometheus:pods" }
    });
    assert_eq!(call(&h.router, put(uri, body)).await.0, StatusCode::OK);

    assert_eq!(call(&h.router, delete(uri)).await.0, StatusCode::OK);
    assert_eq!(call(&h.router, get(uri)).await.0, StatusCode::NOT_FOUND);
    assert_eq!(call(&h.router, delete(uri)).await.0, StatusCode::NOT_FOUND);
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn unknown_kind_is_404() {
    let h = harness();
    let (status, body) = call(&h.router, get("/v1/namespaces/metering/deployments")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(parse_json(body)["error"]
        .as_str()
        .unwrap()
        .contains("deployments"));
}

#[tokio::test]
async fn mismatched_body_is_400() {
    let h = harness();

    // kind differs from the path
    let (status, _) = call(
        &h.router,
        put(
            "/v1/namespaces/metering/reports/pod-usage",
            query_body("pod-usage", "SELECT 1"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // name differs from the path
    let (status, _) = call(
        &h.router,
        put(
            "/v1/namespaces/metering/generationqueries/pod-usage",
            query_body("node-usage", "SELECT 1"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // not an object at all
    let (status, body) = call(
        &h.router,
        put(
            "/v1/namespaces/metering/generationqueries/pod-usage",
            json!({"kind": "GenerationQuery"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(parse_json(body)["error"]
        .as_str()
        .unwrap()
        .starts_with("invalid object"));

    assert!(h.store.is_empty().await);
}

// ---------------------------------------------------------------------------
// End to end: HTTP write → engine → view
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn applied_query_is_materialized_by_running_engine() {
    let h = harness();
    let (tx, rx) = watch::channel(false);
    let engine = tokio::spawn(h.op.clone().run(rx));

    let (status, _) = call(
        &h.router,
        put(
            "/v1/namespaces/metering/generationqueries/pod-usage",
            query_body("pod-usage", "SELECT pod FROM raw"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert!(
        wait_until(Duration::from_secs(2), || h.views.view("view_pod_usage").is_some()).await
    );
    assert_eq!(
        h.views.view("view_pod_usage").as_deref(),
        Some("SELECT pod FROM raw")
    );

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), engine)
        .await
        .expect("engine did not stop")
        .unwrap()
        .unwrap();

    let obj = h
        .store
        .get(
            Kind::GenerationQuery,
            &ObjectKey::new("metering", "pod-usage"),
        )
        .await
        .unwrap();
    assert_eq!(
        obj.meta().resource_version,
        2,
        "status write bumps the version once"
    );
}
