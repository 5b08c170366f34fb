use mtr_resolve::DependencyLister;
use mtr_schemas::{DataSource, GenerationQuery, Report, ScheduledReport};
use mtr_store::Cache;

/// Resolver reads served from the informer cache.
pub struct CacheLister<'a>(pub &'a Cache);

impl DependencyLister for CacheLister<'_> {
    fn generation_query(&self, namespace: &str, name: &str) -> Option<GenerationQuery> {
        self.0.get(namespace, name)
    }

    fn data_source(&self, namespace: &str, name: &str) -> Option<DataSource> {
        self.0.get(namespace, name)
    }

    fn report(&self, namespace: &str, name: &str) -> Option<Report> {
        self.0.get(namespace, name)
    }

    fn scheduled_report(&self, namespace: &str, name: &str) -> Option<ScheduledReport> {
        self.0.get(namespace, name)
    }
}
