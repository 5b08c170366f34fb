use serde::{Deserialize, Serialize};

use crate::{Kind, ObjectMeta};

// ---------------------------------------------------------------------------
// GenerationQuery
// ---------------------------------------------------------------------------

/// A declarative query definition, materialized by the operator into a
/// database view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationQuery {
    pub metadata: ObjectMeta,
    pub spec: GenerationQuerySpec,
    #[serde(default)]
    pub status: GenerationQueryStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationQuerySpec {
    /// Query template text. Dynamic dependencies are referenced through the
    /// `generationQueryViewName` helper.
    pub query: String,
    #[serde(default)]
    pub view: ViewSpec,
    /// Static GenerationQuery dependencies, in declaration order.
    #[serde(default)]
    pub report_queries: Vec<String>,
    /// Dynamic GenerationQuery dependencies: their generated view names are
    /// substituted into `query` at render time.
    #[serde(default)]
    pub dynamic_report_queries: Vec<String>,
    #[serde(default)]
    pub data_sources: Vec<String>,
    #[serde(default)]
    pub reports: Vec<String>,
    #[serde(default)]
    pub scheduled_reports: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSpec {
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationQueryStatus {
    /// Set once, when the view is first materialized, and reused afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_name: Option<String>,
}

impl GenerationQuery {
    pub fn new(meta: ObjectMeta, spec: GenerationQuerySpec) -> Self {
        Self {
            metadata: meta,
            spec,
            status: GenerationQueryStatus::default(),
        }
    }

    /// `true` when the view is enabled and has been materialized at least
    /// once, i.e. dependents may reference it.
    pub fn is_view_ready(&self) -> bool {
        !self.spec.view.disabled && self.status.view_name.is_some()
    }
}

impl GenerationQuerySpec {
    /// Static dependencies across all referenceable kinds, in a fixed order:
    /// queries, data sources, reports, scheduled reports.
    pub fn static_dependencies(&self) -> Vec<DependencyRef> {
        let queries = self
            .report_queries
            .iter()
            .map(|n| DependencyRef::new(Kind::GenerationQuery, n));
        let data_sources = self
            .data_sources
            .iter()
            .map(|n| DependencyRef::new(Kind::DataSource, n));
        let reports = self
            .reports
            .iter()
            .map(|n| DependencyRef::new(Kind::Report, n));
        let scheduled = self
            .scheduled_reports
            .iter()
            .map(|n| DependencyRef::new(Kind::ScheduledReport, n));
        queries
            .chain(data_sources)
            .chain(reports)
            .chain(scheduled)
            .collect()
    }

    pub fn dynamic_dependencies(&self) -> Vec<DependencyRef> {
        self.dynamic_report_queries
            .iter()
            .map(|n| DependencyRef::new(Kind::GenerationQuery, n))
            .collect()
    }

    /// `true` if `name` appears in either GenerationQuery dependency list.
    pub fn references_query(&self, name: &str) -> bool {
        self.report_queries
            .iter()
            .chain(self.dynamic_report_queries.iter())
            .any(|d| d == name)
    }

    /// `true` if this spec names `name` as a dependency of the given kind.
    pub fn references(&self, kind: Kind, name: &str) -> bool {
        match kind {
            Kind::GenerationQuery => self.references_query(name),
            Kind::DataSource => self.data_sources.iter().any(|d| d == name),
            Kind::Report => self.reports.iter().any(|d| d == name),
            Kind::ScheduledReport => self.scheduled_reports.iter().any(|d| d == name),
        }
    }
}

// ---------------------------------------------------------------------------
// Report / ScheduledReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ObjectMeta,
    pub spec: ReportSpec,
    #[serde(default)]
    pub status: ReportStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSpec {
    pub generation_query: String,
}

/// Written by the report runner once the report's table exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledReport {
    pub metadata: ObjectMeta,
    pub spec: ScheduledReportSpec,
    #[serde(default)]
    pub status: ReportStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledReportSpec {
    pub generation_query: String,
    #[serde(default)]
    pub schedule: String,
}

// ---------------------------------------------------------------------------
// DataSource
// ---------------------------------------------------------------------------

/// Leaf dependency. Uninitialized until its status carries a table name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DataSourceSpec,
    #[serde(default)]
    pub status: DataSourceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceSpec {
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
}

impl DataSource {
    pub fn is_initialized(&self) -> bool {
        self.status.table_name.is_some()
    }
}

// ---------------------------------------------------------------------------
// DependencyRef
// ---------------------------------------------------------------------------

/// A named reference from a GenerationQuery spec to another object in the
/// same namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DependencyRef {
    pub kind: Kind,
    pub name: String,
}

impl DependencyRef {
    pub fn new(kind: Kind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for DependencyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}", self.kind, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> GenerationQuerySpec {
        GenerationQuerySpec {
            query: "SELECT 1".to_string(),
            report_queries: vec!["a".into()],
            dynamic_report_queries: vec!["b".into()],
            data_sources: vec!["ds".into()],
            reports: vec!["r".into()],
            ..Default::default()
        }
    }

    #[test]
    fn static_dependencies_keep_kind_order() {
        let deps = spec().static_dependencies();
        let kinds: Vec<Kind> = deps.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![Kind::GenerationQuery, Kind::DataSource, Kind::Report]
        );
    }

    #[test]
    fn references_query_covers_static_and_dynamic() {
        let s = spec();
        assert!(s.references_query("a"));
        assert!(s.references_query("b"));
        assert!(!s.references_query("ds"));
        assert!(s.references(Kind::DataSource, "ds"));
        assert!(!s.references(Kind::ScheduledReport, "r"));
    }

    #[test]
    fn view_ready_requires_enabled_view_and_name() {
        let mut q = GenerationQuery::new(ObjectMeta::new("ns", "a"), spec());
        assert!(!q.is_view_ready());
        q.status.view_name = Some("view_a".into());
        assert!(q.is_view_ready());
        q.spec.view.disabled = true;
        assert!(!q.is_view_ready());
    }
}
