use std::sync::Arc;

use async_trait::async_trait;
use mtr_queue::SyncHandler;
use mtr_resolve::{resolve, Resolution};
use mtr_schemas::{
    DataSource, DependencyRef, GenerationQuery, Kind, ObjectKey, Report, ScheduledReport,
};

use crate::{CacheLister, PropagationReport, Reporting, SyncError};

/// Worker-pool entry point for one kind.
pub(crate) struct KindHandler {
    op: Arc<Reporting>,
    kind: Kind,
}

impl KindHandler {
    pub(crate) fn new(op: Arc<Reporting>, kind: Kind) -> Self {
        Self { op, kind }
    }
}

#[async_trait]
impl SyncHandler for KindHandler {
    type Error = SyncError;

    async fn sync(&self, key: &str) -> Result<(), SyncError> {
        match self.kind {
            Kind::GenerationQuery => self.op.sync_generation_query(key).await,
            Kind::Report => self.op.sync_report(key).await,
            Kind::ScheduledReport => self.op.sync_scheduled_report(key).await,
            Kind::DataSource => self.op.sync_data_source(key).await,
        }
    }
}

fn parse_key(kind: Kind, key: &str) -> Option<ObjectKey> {
    match ObjectKey::parse(key) {
        Ok(k) => Some(k),
        Err(e) => {
            // never retried: the key cannot change
            tracing::error!(kind = %kind, key, error = %e, "invalid resource key");
            None
        }
    }
}

impl Reporting {
    pub async fn sync_generation_query(&self, key: &str) -> Result<(), SyncError> {
        let Some(key) = parse_key(Kind::GenerationQuery, key) else {
            return Ok(());
        };
        let Some(query) = self.cache.get::<GenerationQuery>(&key.namespace, &key.name) else {
            tracing::info!("GenerationQuery {:?} does not exist anymore", key.to_string());
            return Ok(());
        };
        tracing::debug!(resource_version = query.metadata.resource_version, "syncing GenerationQuery");

        let lister = CacheLister(&self.cache);
        let handler = |origin: &GenerationQuery, dep: &DependencyRef| {
            self.queue_uninitialized(origin, dep)
        };
        let deps = match resolve(&lister, &query, &handler)? {
            Resolution::Ready(deps) => deps,
            Resolution::NotReady(unready) => {
                let names: Vec<String> = unready.iter().map(ToString::to_string).collect();
                tracing::info!(
                    unready = ?names,
                    "dependencies not ready, deferring GenerationQuery"
                );
                self.queues.generation_queries.add_after(
                    key.to_string(),
                    self.cfg.requeue.dependency_defer(),
                );
                return Ok(());
            }
        };

        self.materialize(&query, &deps).await?;
        self.log_propagation(self.propagate_generation_query(&query).await);
        Ok(())
    }

    pub async fn sync_report(&self, key: &str) -> Result<(), SyncError> {
        let Some(key) = parse_key(Kind::Report, key) else {
            return Ok(());
        };
        let Some(report) = self.cache.get::<Report>(&key.namespace, &key.name) else {
            tracing::info!("Report {:?} does not exist anymore", key.to_string());
            return Ok(());
        };
        self.sync_report_like(
            Kind::Report,
            &key,
            &report.spec.generation_query,
            report.status.table_name.as_deref(),
        )
        .await
    }

    pub async fn sync_scheduled_report(&self, key: &str) -> Result<(), SyncError> {
        let Some(key) = parse_key(Kind::ScheduledReport, key) else {
            return Ok(());
        };
        let Some(report) = self.cache.get::<ScheduledReport>(&key.namespace, &key.name) else {
            tracing::info!("ScheduledReport {:?} does not exist anymore", key.to_string());
            return Ok(());
        };
        self.sync_report_like(
            Kind::ScheduledReport,
            &key,
            &report.spec.generation_query,
            report.status.table_name.as_deref(),
        )
        .await
    }

    pub async fn sync_data_source(&self, key: &str) -> Result<(), SyncError> {
        let Some(key) = parse_key(Kind::DataSource, key) else {
            return Ok(());
        };
        let Some(ds) = self.cache.get::<DataSource>(&key.namespace, &key.name) else {
            tracing::info!("DataSource {:?} does not exist anymore", key.to_string());
            return Ok(());
        };
        if !ds.is_initialized() {
            tracing::debug!("DataSource has no table yet");
            return Ok(());
        }
        let report = self
            .propagate_dependency(Kind::DataSource, &key.namespace, &key.name)
            .await;
        self.log_propagation(report);
        Ok(())
    }

    /// Reports and ScheduledReports need their GenerationQuery to exist and,
    /// unless its view is disabled, to be materialized. Running the report
    /// is not done here; once it has a table, queries built on it are
    /// re-queued.
    async fn sync_report_like(
        &self,
        kind: Kind,
        key: &ObjectKey,
        generation_query: &str,
        table_name: Option<&str>,
    ) -> Result<(), SyncError> {
        let Some(query) = self
            .cache
            .get::<GenerationQuery>(&key.namespace, generation_query)
        else {
            return Err(SyncError::MissingGenerationQuery {
                kind,
                name: key.name.clone(),
                generation_query: generation_query.to_string(),
            });
        };

        if !query.spec.view.disabled && query.status.view_name.is_none() {
            tracing::info!(
                generation_query,
                "GenerationQuery not materialized yet, deferring {kind}"
            );
            let defer = self.cfg.requeue.dependency_defer();
            self.queues
                .generation_queries
                .add_after(query.metadata.key().to_string(), defer);
            self.queues.get(kind).add_after(key.to_string(), defer);
            return Ok(());
        }

        match table_name {
            Some(table) => {
                tracing::debug!(table, "{kind} has a table");
                let report = self
                    .propagate_dependency(kind, &key.namespace, &key.name)
                    .await;
                self.log_propagation(report);
            }
            None => tracing::debug!(generation_query, "{kind} is ready to run"),
        }
        Ok(())
    }

    /// Queue an unready dependency on its own kind's queue so its pass runs
    /// soon rather than at the next external change.
    ///
    /// The nudge is delayed like the dependent's own retry, so two objects
    /// that keep nudging each other cycle at the defer rate, not in a tight
    /// loop. A query with its view disabled never gets a view name, and is
    /// left alone.
    fn queue_uninitialized(&self, origin: &GenerationQuery, dep: &DependencyRef) {
        let key = ObjectKey::new(&origin.metadata.namespace, &dep.name);
        if dep.kind == Kind::GenerationQuery
            && self
                .cache
                .get::<GenerationQuery>(&key.namespace, &key.name)
                .is_some_and(|q| q.spec.view.disabled)
        {
            tracing::debug!(dependency = %dep, origin = %origin.metadata.name, "dependency has its view disabled, not queueing");
            return;
        }
        tracing::debug!(dependency = %dep, origin = %origin.metadata.name, "queueing uninitialized dependency");
        self.queues
            .get(dep.kind)
            .add_after(key.to_string(), self.cfg.requeue.dependency_defer());
    }

    fn log_propagation(&self, report: PropagationReport) {
        if report.total_queued() > 0 {
            tracing::debug!(queued = report.total_queued(), "queued dependents");
        }
        for (kind, e) in &report.failed {
            tracing::warn!(kind = %kind, error = %e, "dependents of this kind were not queued");
        }
    }
}
