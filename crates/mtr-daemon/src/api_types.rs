//! Request and response types for the mtr-daemon HTTP endpoints.
//!
//! Plain `Serialize + Deserialize` data so tests can decode what Axum
//! encodes. No business logic lives here.

use std::collections::BTreeMap;

use mtr_schemas::AnyObject;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// /v1/status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
    /// SHA-256 of the canonical effective configuration.
    pub config_hash: String,
    /// `None` when every namespace is reconciled.
    pub namespace: Option<String>,
    /// Pending keys per kind, keyed by kind name.
    pub queue_depths: BTreeMap<String, usize>,
    /// Objects in the in-process store, all kinds.
    pub objects: usize,
}

// ---------------------------------------------------------------------------
// /v1/namespaces/{ns}/{kind}[/{name}]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectListResponse {
    pub kind: String,
    pub namespace: String,
    pub items: Vec<AnyObject>,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
