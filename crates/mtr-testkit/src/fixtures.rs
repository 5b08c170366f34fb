use mtr_config::OperatorConfig;
use mtr_schemas::{
    DataSource, DataSourceSpec, DataSourceStatus, GenerationQuery, GenerationQuerySpec,
    ObjectMeta, Report, ReportSpec, ReportStatus, ScheduledReport, ScheduledReportSpec,
};

pub const TEST_NAMESPACE: &str = "metering";

/// Config with millisecond-scale delays so scenarios converge quickly.
pub fn test_config() -> OperatorConfig {
    let mut cfg = OperatorConfig::default();
    cfg.requeue.base_delay_ms = 1;
    cfg.requeue.max_delay_ms = 20;
    cfg.requeue.dependency_defer_ms = 10;
    cfg
}

/// Builder for GenerationQuery fixtures in [`TEST_NAMESPACE`].
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    query: GenerationQuery,
}

pub fn generation_query(name: &str, query: &str) -> QueryBuilder {
    QueryBuilder {
        query: GenerationQuery::new(
            ObjectMeta::new(TEST_NAMESPACE, name),
            GenerationQuerySpec {
                query: query.to_string(),
                ..Default::default()
            },
        ),
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

impl QueryBuilder {
    pub fn namespace(mut self, ns: &str) -> Self {
        self.query.metadata.namespace = ns.to_string();
        self
    }

    pub fn report_queries(mut self, names: &[&str]) -> Self {
        self.query.spec.report_queries = owned(names);
        self
    }

    pub fn dynamic_report_queries(mut self, names: &[&str]) -> Self {
        self.query.spec.dynamic_report_queries = owned(names);
        self
    }

    pub fn data_sources(mut self, names: &[&str]) -> Self {
        self.query.spec.data_sources = owned(names);
        self
    }

    pub fn reports(mut self, names: &[&str]) -> Self {
        self.query.spec.reports = owned(names);
        self
    }

    pub fn scheduled_reports(mut self, names: &[&str]) -> Self {
        self.query.spec.scheduled_reports = owned(names);
        self
    }

    pub fn view_disabled(mut self) -> Self {
        self.query.spec.view.disabled = true;
        self
    }

    pub fn view_name(mut self, view: &str) -> Self {
        self.query.status.view_name = Some(view.to_string());
        self
    }

    pub fn build(self) -> GenerationQuery {
        self.query
    }
}

pub fn data_source(name: &str, table: Option<&str>) -> DataSource {
    DataSource {
        metadata: ObjectMeta::new(TEST_NAMESPACE, name),
        spec: DataSourceSpec {
            source: format!("prometheus:{name}"),
        },
        status: DataSourceStatus {
            table_name: table.map(str::to_string),
        },
    }
}

pub fn report(name: &str, generation_query: &str, table: Option<&str>) -> Report {
    Report {
        metadata: ObjectMeta::new(TEST_NAMESPACE, name),
        spec: ReportSpec {
            generation_query: generation_query.to_string(),
        },
        status: ReportStatus {
            table_name: table.map(str::to_string),
        },
    }
}

pub fn scheduled_report(name: &str, generation_query: &str, table: Option<&str>) -> ScheduledReport {
    ScheduledReport {
        metadata: ObjectMeta::new(TEST_NAMESPACE, name),
        spec: ScheduledReportSpec {
            generation_query: generation_query.to_string(),
            schedule: "hourly".to_string(),
        },
        status: ReportStatus {
            table_name: table.map(str::to_string),
        },
    }
}
