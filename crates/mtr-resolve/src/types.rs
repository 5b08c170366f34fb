use std::collections::BTreeMap;
use std::fmt;

use mtr_schemas::{DataSource, DependencyRef, GenerationQuery, Report, ScheduledReport};

/// Read access to the objects a GenerationQuery may reference, all within
/// one namespace.
pub trait DependencyLister {
    fn generation_query(&self, namespace: &str, name: &str) -> Option<GenerationQuery>;
    fn data_source(&self, namespace: &str, name: &str) -> Option<DataSource>;
    fn report(&self, namespace: &str, name: &str) -> Option<Report>;
    fn scheduled_report(&self, namespace: &str, name: &str) -> Option<ScheduledReport>;
}

/// Told about each dependency that exists but is not ready yet.
pub trait UninitializedHandler {
    fn handle_uninitialized(&self, origin: &GenerationQuery, dependency: &DependencyRef);
}

impl<F> UninitializedHandler for F
where
    F: Fn(&GenerationQuery, &DependencyRef),
{
    fn handle_uninitialized(&self, origin: &GenerationQuery, dependency: &DependencyRef) {
        self(origin, dependency)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Ready(DependencySet),
    /// Distinct dependencies that exist but are not ready, in walk order.
    NotReady(Vec<DependencyRef>),
}

/// Resolved dependency closure of one GenerationQuery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    /// Every GenerationQuery in the closure, static and dynamic, in
    /// first-visit order.
    pub generation_queries: Vec<GenerationQuery>,
    /// The query's own dynamic dependencies.
    pub dynamic_generation_queries: Vec<GenerationQuery>,
    pub data_sources: Vec<DataSource>,
    pub reports: Vec<Report>,
    pub scheduled_reports: Vec<ScheduledReport>,
    /// Dynamic dependency name -> its generated view name.
    pub dynamic_view_names: BTreeMap<String, String>,
}

/// The referencing spec is wrong. Recurs on every pass until it is edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Names on the loop, starting and ending with the repeated query name.
    /// A loop closed by a report built from a query on the path has the
    /// report's name just before the repeated one.
    Cycle { path: Vec<String> },
    MissingDependency {
        dependency: DependencyRef,
        referenced_by: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Cycle { path } => {
                write!(f, "dependency cycle: {}", path.join(" -> "))
            }
            ValidationError::MissingDependency {
                dependency,
                referenced_by,
            } => write!(
                f,
                "{dependency} referenced by GenerationQuery {referenced_by:?} does not exist"
            ),
        }
    }
}

impl std::error::Error for ValidationError {}
