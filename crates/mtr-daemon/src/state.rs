//! Shared runtime state for mtr-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The reconciliation
//! engine itself is owned elsewhere (`Reporting::run`); this holds handles to
//! it and to the store it reconciles.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mtr_operator::Reporting;
use mtr_schemas::Kind;
use mtr_store::MemoryStore;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat {
        ts_millis: i64,
        queue_depths: BTreeMap<String, usize>,
    },
    ObjectChanged {
        kind: String,
        key: String,
        change: String,
    },
}

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    pub build: BuildInfo,
    pub op: Arc<Reporting>,
    /// The same store `op` reconciles; HTTP writes go through `apply` so
    /// status stays owned by the operator.
    pub store: Arc<MemoryStore>,
    pub config_hash: String,
    pub bus: broadcast::Sender<BusMsg>,
    started: Instant,
}

impl AppState {
    pub fn new(op: Arc<Reporting>, store: Arc<MemoryStore>, config_hash: String) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            build: BuildInfo {
                service: "mtr-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            op,
            store,
            config_hash,
            bus,
            started: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn queue_depths(&self) -> BTreeMap<String, usize> {
        depth_names(self.op.queue_depths())
    }

    pub fn publish_change(&self, kind: Kind, key: String, change: &str) {
        // No subscribers is fine.
        let _ = self.bus.send(BusMsg::ObjectChanged {
            kind: kind.to_string(),
            key,
            change: change.to_string(),
        });
    }
}

fn depth_names(depths: BTreeMap<Kind, usize>) -> BTreeMap<String, usize> {
    depths
        .into_iter()
        .map(|(k, n)| (k.to_string(), n))
        .collect()
}

/// Emit a heartbeat with current queue depths every `interval` until
/// `shutdown` flips.
pub fn spawn_heartbeat(
    state: Arc<AppState>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
            }
            let _ = state.bus.send(BusMsg::Heartbeat {
                ts_millis: chrono::Utc::now().timestamp_millis(),
                queue_depths: state.queue_depths(),
            });
        }
    })
}
