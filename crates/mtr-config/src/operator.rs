use std::time::Duration;

use anyhow::{bail, Context, Result};
use mtr_schemas::Kind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Effective configuration of one operator process.
///
/// Every field has a default, so an empty document is a valid config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OperatorConfig {
    /// Only reconcile objects in this namespace. `None` watches all.
    pub namespace: Option<String>,
    pub workers: WorkerCounts,
    pub max_requeues: MaxRequeues,
    pub requeue: RequeueConfig,
    pub presto: PrestoConfig,
    pub log: LogConfig,
    pub api: ApiConfig,
}

impl OperatorConfig {
    pub fn from_json(v: &Value) -> Result<Self> {
        let cfg: OperatorConfig =
            serde_json::from_value(v.clone()).context("invalid operator config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        for kind in Kind::ALL {
            if self.workers.get(kind) == 0 {
                bail!("CONFIG_INVALID: workers for {kind} must be at least 1");
            }
        }
        if self.requeue.max_delay_ms < self.requeue.base_delay_ms {
            bail!(
                "CONFIG_INVALID: requeue.max_delay_ms ({}) is below requeue.base_delay_ms ({})",
                self.requeue.max_delay_ms,
                self.requeue.base_delay_ms
            );
        }
        Ok(())
    }

    /// `true` if objects in `namespace` are within this operator's scope.
    pub fn watches_namespace(&self, namespace: &str) -> bool {
        self.namespace
            .as_deref()
            .map_or(true, |ns| ns.is_empty() || ns == namespace)
    }
}

// ---------------------------------------------------------------------------
// Per-kind worker counts and requeue ceilings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerCounts {
    pub generation_queries: usize,
    pub reports: usize,
    pub scheduled_reports: usize,
    pub data_sources: usize,
}

impl Default for WorkerCounts {
    fn default() -> Self {
        Self {
            generation_queries: 2,
            reports: 2,
            scheduled_reports: 2,
            data_sources: 2,
        }
    }
}

impl WorkerCounts {
    pub fn get(&self, kind: Kind) -> usize {
        match kind {
            Kind::GenerationQuery => self.generation_queries,
            Kind::Report => self.reports,
            Kind::ScheduledReport => self.scheduled_reports,
            Kind::DataSource => self.data_sources,
        }
    }
}

/// How many times a failing key is re-queued before it is dropped.
///
/// GenerationQueries get a higher ceiling: they can reference many other
/// objects and need more passes while those finish setting up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaxRequeues {
    pub generation_queries: u32,
    pub reports: u32,
    pub scheduled_reports: u32,
    pub data_sources: u32,
}

impl Default for MaxRequeues {
    fn default() -> Self {
        Self {
            generation_queries: 10,
            reports: 5,
            scheduled_reports: 5,
            data_sources: 5,
        }
    }
}

impl MaxRequeues {
    pub fn get(&self, kind: Kind) -> u32 {
        match kind {
            Kind::GenerationQuery => self.generation_queries,
            Kind::Report => self.reports,
            Kind::ScheduledReport => self.scheduled_reports,
            Kind::DataSource => self.data_sources,
        }
    }
}


// ---------------------------------------------------------------------------
// Requeue timing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequeueConfig {
    /// First retry delay after a failed sync; doubles per failure.
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Delay before re-checking a query whose dependencies were not ready.
    pub dependency_defer_ms: u64,
}

impl Default for RequeueConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 5,
            max_delay_ms: 60_000,
            dependency_defer_ms: 5_000,
        }
    }
}

impl RequeueConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn dependency_defer(&self) -> Duration {
        Duration::from_millis(self.dependency_defer_ms)
    }
}

// ---------------------------------------------------------------------------
// Presto
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrestoConfig {
    /// `host:port`, or a full `http(s)://` URL.
    pub host: String,
    pub user: String,
    pub catalog: String,
    pub schema: String,
    /// Name of the env var holding the Presto password. Never the password.
    pub password_env: Option<String>,
    /// Log every CREATE VIEW statement at debug level.
    pub log_ddl_queries: bool,
}

impl Default for PrestoConfig {
    fn default() -> Self {
        Self {
            host: "presto:8080".to_string(),
            user: "reporting-operator".to_string(),
            catalog: "hive".to_string(),
            schema: "default".to_string(),
            password_env: None,
            log_ddl_queries: false,
        }
    }
}

impl PrestoConfig {
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{host}")
        }
    }
}

// ---------------------------------------------------------------------------
// Logging / API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub disable_timestamp: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            disable_timestamp: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub listen_addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = OperatorConfig::from_json(&serde_json::json!({})).unwrap();
        assert_eq!(cfg, OperatorConfig::default());
        assert_eq!(cfg.max_requeues.get(Kind::GenerationQuery), 10);
        assert_eq!(cfg.max_requeues.get(Kind::Report), 5);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = OperatorConfig::from_json(&serde_json::json!({"presto": {"hots": "x"}}))
            .unwrap_err();
        assert!(format!("{err:#}").contains("hots"));
    }

    #[test]
    fn zero_workers_is_invalid() {
        let err = OperatorConfig::from_json(&serde_json::json!({"workers": {"reports": 0}}))
            .unwrap_err();
        assert!(err.to_string().contains("CONFIG_INVALID"));
    }

    #[test]
    fn presto_base_url_adds_scheme() {
        let mut p = PrestoConfig::default();
        assert_eq!(p.base_url(), "http://presto:8080");
        p.host = "https://presto.example:8443/".to_string();
        assert_eq!(p.base_url(), "https://presto.example:8443");
    }

    #[test]
    fn namespace_scope() {
        let mut cfg = OperatorConfig::default();
        assert!(cfg.watches_namespace("anything"));
        cfg.namespace = Some("metering".to_string());
        assert!(cfg.watches_namespace("metering"));
        assert!(!cfg.watches_namespace("other"));
    }
}
