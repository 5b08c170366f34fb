use mtr_resolve::DependencySet;
use mtr_schemas::{GenerationQuery, Resource};
use mtr_store::WatchEvent;
use mtr_view::generation_query_view_name;

use crate::{Reporting, SyncError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeOutcome {
    /// `spec.view.disabled`: nothing created, status untouched.
    Disabled,
    Materialized {
        view_name: String,
        /// `false` when status already carried `view_name`.
        status_written: bool,
    },
}

impl Reporting {
    /// Create or replace the view for `query` and record its name.
    ///
    /// The name already in status is reused; a fresh query gets the
    /// deterministic `view_<name>`. Safe to repeat: an unchanged query
    /// reissues the same statement and skips the status write.
    pub async fn materialize(
        &self,
        query: &GenerationQuery,
        deps: &DependencySet,
    ) -> Result<MaterializeOutcome, SyncError> {
        if query.spec.view.disabled {
            tracing::debug!("view disabled, skipping materialization");
            return Ok(MaterializeOutcome::Disabled);
        }

        let meta = &query.metadata;
        let view_name = query
            .status
            .view_name
            .clone()
            .unwrap_or_else(|| generation_query_view_name(&meta.name));

        let rendered = self.renderer.render(
            &query.spec.query,
            &meta.namespace,
            &meta.name,
            &deps.dynamic_view_names,
        )?;

        tracing::debug!(view_name = %view_name, "creating view");
        self.views
            .create_or_replace_view(&view_name, &rendered)
            .await?;

        let status_written = self.record_view_name(query, &view_name).await?;
        tracing::info!(view_name = %view_name, status_written, "view materialized");
        Ok(MaterializeOutcome::Materialized {
            view_name,
            status_written,
        })
    }

    /// Compare-and-update `status.view_name`. No write when it already
    /// matches.
    async fn record_view_name(
        &self,
        query: &GenerationQuery,
        view_name: &str,
    ) -> Result<bool, SyncError> {
        if query.status.view_name.as_deref() == Some(view_name) {
            return Ok(false);
        }

        let mut updated = query.clone();
        updated.status.view_name = Some(view_name.to_string());
        match self.store.update(updated.into_any()).await {
            Ok(stored) => {
                self.cache.apply_event(&WatchEvent::Modified(stored));
                Ok(true)
            }
            Err(e) => {
                if e.is_conflict() {
                    tracing::warn!(error = %e, "status update conflicted, will retry from latest version");
                }
                Err(e.into())
            }
        }
    }
}
