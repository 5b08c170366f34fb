//! Axum router and HTTP handlers for mtr-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers, tests drive the bare router.
//!
//! The object routes let an external actor inspect and edit what the
//! operator reconciles. Writes replace the spec and keep the status, the way
//! a user editing a manifest would.

use std::{convert::Infallible, str::FromStr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use mtr_schemas::{AnyObject, Kind, ObjectKey};
use mtr_store::{ResourceStore, StoreError};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::{
    api_types::{ErrorResponse, HealthResponse, ObjectListResponse, StatusResponse},
    state::{AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/namespaces/:ns/:kind", get(list_objects))
        .route(
            "/v1/namespaces/:ns/:kind/:name",
            get(get_object).put(put_object).delete(delete_object),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

fn error(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: msg.into() })).into_response()
}

fn store_error(e: StoreError) -> Response {
    let status = match &e {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::AlreadyExists { .. } | StoreError::Conflict { .. } => StatusCode::CONFLICT,
        StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
        StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    error(status, e.to_string())
}

fn parse_kind(raw: &str) -> Result<Kind, Response> {
    Kind::from_str(raw).map_err(|e| error(StatusCode::NOT_FOUND, e.to_string()))
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let body = StatusResponse {
        service: st.build.service.to_string(),
        version: st.build.version.to_string(),
        uptime_secs: st.uptime_secs(),
        config_hash: st.config_hash.clone(),
        namespace: st.op.config().namespace.clone(),
        queue_depths: st.queue_depths(),
        objects: st.store.len().await,
    };
    (StatusCode::OK, Json(body))
}

// ---------------------------------------------------------------------------
// /v1/namespaces/{ns}/{kind}[/{name}]
// ---------------------------------------------------------------------------

pub(crate) async fn list_objects(
    State(st): State<Arc<AppState>>,
    Path((ns, kind)): Path<(String, String)>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match st.store.list(kind, &ns).await {
        Ok(items) => (
            StatusCode::OK,
            Json(ObjectListResponse {
                kind: kind.to_string(),
                namespace: ns,
                items,
            }),
        )
            .into_response(),
        Err(e) => store_error(e),
    }
}

pub(crate) async fn get_object(
    State(st): State<Arc<AppState>>,
    Path((ns, kind, name)): Path<(String, String, String)>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match st.store.get(kind, &ObjectKey::new(ns, name)).await {
        Ok(obj) => (StatusCode::OK, Json(obj)).into_response(),
        Err(e) => store_error(e),
    }
}

/// Create or replace the object's spec. The body's `kind` and name must
/// match the path; an omitted namespace is taken from the path.
pub(crate) async fn put_object(
    State(st): State<Arc<AppState>>,
    Path((ns, kind, name)): Path<(String, String, String)>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let mut obj: AnyObject = match serde_json::from_value(body) {
        Ok(o) => o,
        Err(e) => return error(StatusCode::BAD_REQUEST, format!("invalid object: {e}")),
    };
    if obj.kind() != kind {
        return error(
            StatusCode::BAD_REQUEST,
            format!("body kind {} does not match path kind {kind}", obj.kind()),
        );
    }
    {
        let meta = obj.meta_mut();
        if meta.namespace.is_empty() {
            meta.namespace = ns.clone();
        }
        if meta.namespace != ns || meta.name != name {
            return error(
                StatusCode::BAD_REQUEST,
                format!("body names {} but path names {ns}/{name}", meta.key()),
            );
        }
    }

    match st.store.apply(obj).await {
        Ok(stored) => {
            let key = stored.meta().key().to_string();
            info!(kind = %kind, key = %key, version = stored.meta().resource_version, "object applied");
            st.publish_change(kind, key, "applied");
            (StatusCode::OK, Json(stored)).into_response()
        }
        Err(e) => store_error(e),
    }
}

pub(crate) async fn delete_object(
    State(st): State<Arc<AppState>>,
    Path((ns, kind, name)): Path<(String, String, String)>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let key = ObjectKey::new(ns, name);
    match st.store.delete(kind, &key).await {
        Ok(removed) => {
            info!(kind = %kind, key = %key, "object deleted");
            st.publish_change(kind, key.to_string(), "deleted");
            (StatusCode::OK, Json(removed)).into_response()
        }
        Err(e) => store_error(e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let events = broadcast_to_sse(st.bus.subscribe());
    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        // lagged receivers skip ahead
        let m = msg.ok()?;
        let event_name = match &m {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::ObjectChanged { .. } => "object",
        };
        let data = serde_json::to_string(&m).ok()?;
        Some(Ok(Event::default().event(event_name).data(data)))
    })
}
