//! Dependency resolution over small graphs.
//!
//! GREEN when:
//! - a query whose dependencies are all ready resolves to its full closure
//! - dynamic dependencies map to their generated view names
//! - A -> B -> C -> A is reported as a cycle, from any entry point
//! - a cycle reached through an acyclic prefix reports only the loop
//! - a report built from a query on the current path closes a cycle,
//!   whether or not the report has a table yet
//! - a missing dependency names the dependency and its referencer
//! - unready dependencies are reported once each, and only then is the
//!   handler called
//! - validation errors win over unready dependencies

use std::cell::RefCell;
use std::collections::BTreeMap;

use mtr_resolve::{resolve, DependencyLister, Resolution, ValidationError};
use mtr_schemas::{
    DataSource, DataSourceSpec, DataSourceStatus, DependencyRef, GenerationQuery,
    GenerationQuerySpec, Kind, ObjectMeta, Report, ReportSpec, ReportStatus, ScheduledReport,
};

const NS: &str = "metering";

#[derive(Default)]
struct MapLister {
    queries: BTreeMap<String, GenerationQuery>,
    data_sources: BTreeMap<String, DataSource>,
    reports: BTreeMap<String, Report>,
}

impl MapLister {
    fn query(mut self, q: GenerationQuery) -> Self {
        self.queries.insert(q.metadata.name.clone(), q);
        self
    }

    fn data_source(mut self, name: &str, table: Option<&str>) -> Self {
        self.data_sources.insert(
            name.to_string(),
            DataSource {
                metadata: ObjectMeta::new(NS, name),
                spec: DataSourceSpec::default(),
                status: DataSourceStatus {
                    table_name: table.map(str::to_string),
                },
            },
        );
        self
    }

    fn report(self, name: &str, table: Option<&str>) -> Self {
        self.report_from(name, "unused", table)
    }

    fn report_from(mut self, name: &str, generation_query: &str, table: Option<&str>) -> Self {
        self.reports.insert(
            name.to_string(),
            Report {
                metadata: ObjectMeta::new(NS, name),
                spec: ReportSpec {
                    generation_query: generation_query.to_string(),
                },
                status: ReportStatus {
                    table_name: table.map(str::to_string),
                },
            },
        );
        self
    }
}

impl DependencyLister for MapLister {
    fn generation_query(&self, namespace: &str, name: &str) -> Option<GenerationQuery> {
        assert_eq!(namespace, NS);
        self.queries.get(name).cloned()
    }

    fn data_source(&self, _namespace: &str, name: &str) -> Option<DataSource> {
        self.data_sources.get(name).cloned()
    }

    fn report(&self, _namespace: &str, name: &str) -> Option<Report> {
        self.reports.get(name).cloned()
    }

    fn scheduled_report(&self, _namespace: &str, _name: &str) -> Option<ScheduledReport> {
        None
    }
}

struct Q {
    name: &'static str,
    statics: Vec<&'static str>,
    dynamics: Vec<&'static str>,
    data_sources: Vec<&'static str>,
    reports: Vec<&'static str>,
    view: Option<String>,
}

impl Q {
    fn new(name: &'static str) -> Self {
        Q {
            name,
            statics: vec![],
            dynamics: vec![],
            data_sources: vec![],
            reports: vec![],
            view: None,
        }
    }

    fn statics(mut self, deps: &[&'static str]) -> Self {
        self.statics = deps.to_vec();
        self
    }

    fn dynamics(mut self, deps: &[&'static str]) -> Self {
        self.dynamics = deps.to_vec();
        self
    }

    fn data_sources(mut self, deps: &[&'static str]) -> Self {
        self.data_sources = deps.to_vec();
        self
    }

    fn reports(mut self, deps: &[&'static str]) -> Self {
        self.reports = deps.to_vec();
        self
    }

    fn materialized(mut self) -> Self {
        self.view = Some(format!("view_{}", self.name));
        self
    }

    fn build(self) -> GenerationQuery {
        let strings = |v: Vec<&str>| -> Vec<String> { v.into_iter().map(str::to_string).collect() };
        let mut q = GenerationQuery::new(
            ObjectMeta::new(NS, self.name),
            GenerationQuerySpec {
                query: "SELECT 1".to_string(),
                report_queries: strings(self.statics),
                dynamic_report_queries: strings(self.dynamics),
                data_sources: strings(self.data_sources),
                reports: strings(self.reports),
                ..Default::default()
            },
        );
        q.status.view_name = self.view;
        q
    }
}

fn no_handler(_: &GenerationQuery, dep: &DependencyRef) {
    panic!("handler must not run, got {dep}");
}

fn names(qs: &[GenerationQuery]) -> Vec<&str> {
    qs.iter().map(|q| q.metadata.name.as_str()).collect()
}

#[test]
fn ready_closure_is_collected_transitively() {
    let lister = MapLister::default()
        .query(Q::new("a").data_sources(&["pods"]).materialized().build())
        .query(Q::new("b").statics(&["a"]).materialized().build())
        .query(Q::new("c").materialized().build())
        .data_source("pods", Some("datasource_pods"))
        .report("daily", Some("report_daily"));
    let target = Q::new("d")
        .statics(&["b"])
        .dynamics(&["c"])
        .reports(&["daily"])
        .build();

    let Resolution::Ready(set) = resolve(&lister, &target, &no_handler).unwrap() else {
        panic!("expected ready");
    };
    assert_eq!(names(&set.generation_queries), vec!["b", "a", "c"]);
    assert_eq!(names(&set.dynamic_generation_queries), vec!["c"]);
    assert_eq!(set.data_sources.len(), 1);
    assert_eq!(set.reports.len(), 1);
    assert_eq!(
        set.dynamic_view_names.get("c").map(String::as_str),
        Some("view_c")
    );
    assert_eq!(set.dynamic_view_names.len(), 1);
}

#[test]
fn diamond_is_walked_once() {
    let lister = MapLister::default()
        .query(Q::new("base").materialized().build())
        .query(Q::new("left").statics(&["base"]).materialized().build())
        .query(Q::new("right").statics(&["base"]).materialized().build());
    let target = Q::new("top").statics(&["left", "right"]).build();

    let Resolution::Ready(set) = resolve(&lister, &target, &no_handler).unwrap() else {
        panic!("expected ready");
    };
    assert_eq!(names(&set.generation_queries), vec!["left", "base", "right"]);
}

#[test]
fn three_node_cycle_is_detected_from_every_entry() {
    let lister = MapLister::default()
        .query(Q::new("A").statics(&["B"]).build())
        .query(Q::new("B").statics(&["C"]).build())
        .query(Q::new("C").dynamics(&["A"]).build());

    for (entry, path) in [
        ("A", vec!["A", "B", "C", "A"]),
        ("B", vec!["B", "C", "A", "B"]),
        ("C", vec!["C", "A", "B", "C"]),
    ] {
        let q = lister.queries[entry].clone();
        let err = resolve(&lister, &q, &no_handler).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Cycle {
                path: path.into_iter().map(str::to_string).collect()
            }
        );
    }
}

#[test]
fn cycle_path_starts_at_the_repeated_name() {
    let lister = MapLister::default()
        .query(Q::new("B").statics(&["C"]).build())
        .query(Q::new("C").statics(&["B"]).build());
    let entry = Q::new("A").statics(&["B"]).build();

    let err = resolve(&lister, &entry, &no_handler).unwrap_err();
    assert_eq!(
        err,
        ValidationError::Cycle {
            path: vec!["B".to_string(), "C".to_string(), "B".to_string()]
        }
    );
    assert_eq!(err.to_string(), "dependency cycle: B -> C -> B");
}

#[test]
fn report_built_from_the_query_itself_is_a_cycle() {
    for table in [None, Some("report_daily")] {
        let lister = MapLister::default().report_from("daily", "A", table);
        let entry = Q::new("A").reports(&["daily"]).build();

        let err = resolve(&lister, &entry, &no_handler).unwrap_err();
        assert_eq!(err.to_string(), "dependency cycle: A -> daily -> A");
    }
}

#[test]
fn report_built_from_an_ancestor_is_a_cycle() {
    let lister = MapLister::default()
        .query(Q::new("B").reports(&["daily"]).build())
        .report_from("daily", "A", Some("report_daily"));
    let entry = Q::new("A").statics(&["B"]).build();

    let err = resolve(&lister, &entry, &no_handler).unwrap_err();
    assert_eq!(
        err,
        ValidationError::Cycle {
            path: ["A", "B", "daily", "A"].map(String::from).to_vec()
        }
    );
}

#[test]
fn self_reference_is_a_cycle() {
    let q = Q::new("self").statics(&["self"]).build();
    let lister = MapLister::default().query(q.clone());
    let err = resolve(&lister, &q, &no_handler).unwrap_err();
    assert_eq!(err.to_string(), "dependency cycle: self -> self");
}

#[test]
fn missing_dependency_names_referencer() {
    let lister = MapLister::default().query(Q::new("a").data_sources(&["gone"]).build());
    let target = Q::new("b").statics(&["a"]).build();

    let err = resolve(&lister, &target, &no_handler).unwrap_err();
    assert_eq!(
        err,
        ValidationError::MissingDependency {
            dependency: DependencyRef::new(Kind::DataSource, "gone"),
            referenced_by: "a".to_string(),
        }
    );
}

#[test]
fn unready_dependencies_are_reported_once_each() {
    let lister = MapLister::default()
        .query(Q::new("a").data_sources(&["pods"]).build())
        .data_source("pods", None);
    // "pods" reachable twice, "a" has no view yet
    let target = Q::new("b")
        .statics(&["a"])
        .data_sources(&["pods"])
        .build();

    let calls = RefCell::new(Vec::new());
    let handler = |origin: &GenerationQuery, dep: &DependencyRef| {
        assert_eq!(origin.metadata.name, "b");
        calls.borrow_mut().push(dep.clone());
    };

    let res = resolve(&lister, &target, &handler).unwrap();
    let expected = vec![
        DependencyRef::new(Kind::GenerationQuery, "a"),
        DependencyRef::new(Kind::DataSource, "pods"),
    ];
    assert_eq!(res, Resolution::NotReady(expected.clone()));
    assert_eq!(calls.into_inner(), expected);
}

#[test]
fn disabled_view_dependency_is_unready() {
    let mut a = Q::new("a").materialized().build();
    a.spec.view.disabled = true;
    let lister = MapLister::default().query(a);
    let target = Q::new("b").statics(&["a"]).build();

    let res = resolve(&lister, &target, &|_: &GenerationQuery, _: &DependencyRef| {}).unwrap();
    assert_eq!(
        res,
        Resolution::NotReady(vec![DependencyRef::new(Kind::GenerationQuery, "a")])
    );
}

#[test]
fn validation_error_wins_over_unready() {
    let lister = MapLister::default()
        .query(Q::new("a").build())
        .data_source("pods", None);
    let target = Q::new("b")
        .data_sources(&["pods"])
        .statics(&["a", "missing"])
        .build();

    let err = resolve(&lister, &target, &no_handler).unwrap_err();
    assert!(matches!(err, ValidationError::MissingDependency { .. }));
}

#[test]
fn no_dependencies_is_trivially_ready() {
    let q = Q::new("a").build();
    let lister = MapLister::default();
    assert_eq!(
        resolve(&lister, &q, &no_handler).unwrap(),
        Resolution::Ready(Default::default())
    );
}
