use std::collections::BTreeMap;

use mtr_schemas::{GenerationQuery, Kind, ObjectKey, Report, Resource, ScheduledReport};
use mtr_store::StoreError;

use crate::Reporting;

/// What one propagation pass queued, and which relations it could not
/// list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationReport {
    pub queued: BTreeMap<Kind, Vec<ObjectKey>>,
    pub failed: Vec<(Kind, StoreError)>,
}

impl PropagationReport {
    pub fn queued(&self, kind: Kind) -> &[ObjectKey] {
        self.queued.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_queued(&self) -> usize {
        self.queued.values().map(Vec::len).sum()
    }
}

impl Reporting {
    /// Re-queue everything in `query`'s namespace that depends on it: other
    /// GenerationQueries naming it as a static or dynamic dependency, and
    /// Reports and ScheduledReports built from it.
    ///
    /// Each relation is listed separately; a failed listing is logged and
    /// the remaining relations are still attempted.
    pub async fn propagate_generation_query(&self, query: &GenerationQuery) -> PropagationReport {
        let ns = &query.metadata.namespace;
        let name = &query.metadata.name;
        let mut report = PropagationReport::default();

        self.queue_dependents(&mut report, ns, |q: &GenerationQuery| {
            q.metadata.name != *name && q.spec.references_query(name)
        })
        .await;
        self.queue_dependents(&mut report, ns, |r: &Report| r.spec.generation_query == *name)
            .await;
        self.queue_dependents(&mut report, ns, |r: &ScheduledReport| {
            r.spec.generation_query == *name
        })
        .await;

        report
    }

    /// Re-queue the GenerationQueries in `namespace` listing the `kind`
    /// object `name` among their dependencies.
    pub async fn propagate_dependency(
        &self,
        kind: Kind,
        namespace: &str,
        name: &str,
    ) -> PropagationReport {
        let mut report = PropagationReport::default();
        self.queue_dependents(&mut report, namespace, |q: &GenerationQuery| {
            q.spec.references(kind, name)
        })
        .await;
        report
    }

    async fn queue_dependents<T, F>(
        &self,
        report: &mut PropagationReport,
        namespace: &str,
        depends: F,
    ) where
        T: Resource,
        F: Fn(&T) -> bool,
    {
        let listed = match self.store.list(T::KIND, namespace).await {
            Ok(listed) => listed,
            Err(e) => {
                tracing::error!(kind = %T::KIND, namespace, error = %e, "failed to list dependents");
                report.failed.push((T::KIND, e));
                return;
            }
        };

        for obj in listed {
            let Ok(dependent) = T::from_any(obj) else {
                continue;
            };
            if !depends(&dependent) {
                continue;
            }
            let key = dependent.meta().key();
            tracing::debug!(kind = %T::KIND, dependent = %key, "queueing dependent");
            self.enqueue(&dependent.into_any());
            report.queued.entry(T::KIND).or_default().push(key);
        }
    }
}
