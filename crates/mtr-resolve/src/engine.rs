use std::collections::HashSet;

use mtr_schemas::{DependencyRef, GenerationQuery, Kind};

use crate::{DependencyLister, DependencySet, Resolution, UninitializedHandler, ValidationError};

/// Resolve the dependency closure of `query`.
///
/// Depth-first, in declaration order: static dependencies, then dynamic.
/// The first cycle or missing dependency met is returned as an error, and
/// wins over any unready dependency. Otherwise, if anything in the closure
/// is not ready, `handler` is called once per distinct unready dependency
/// and the result is [`Resolution::NotReady`].
pub fn resolve<L, H>(
    lister: &L,
    query: &GenerationQuery,
    handler: &H,
) -> Result<Resolution, ValidationError>
where
    L: DependencyLister + ?Sized,
    H: UninitializedHandler + ?Sized,
{
    let mut walk = Walk {
        lister,
        namespace: &query.metadata.namespace,
        path: Vec::new(),
        on_path: HashSet::new(),
        done: HashSet::new(),
        seen: HashSet::new(),
        set: DependencySet::default(),
        unready: Vec::new(),
    };
    walk.visit_query(query)?;

    if !walk.unready.is_empty() {
        for dep in &walk.unready {
            handler.handle_uninitialized(query, dep);
        }
        return Ok(Resolution::NotReady(walk.unready));
    }

    let mut set = walk.set;
    for name in &query.spec.dynamic_report_queries {
        let Some(dep) = set
            .generation_queries
            .iter()
            .find(|q| &q.metadata.name == name)
            .cloned()
        else {
            continue;
        };
        if let Some(view) = dep.status.view_name.clone() {
            set.dynamic_view_names.insert(name.clone(), view);
        }
        if !set
            .dynamic_generation_queries
            .iter()
            .any(|q| &q.metadata.name == name)
        {
            set.dynamic_generation_queries.push(dep);
        }
    }
    Ok(Resolution::Ready(set))
}

struct Walk<'a, L: ?Sized> {
    lister: &'a L,
    namespace: &'a str,
    path: Vec<String>,
    on_path: HashSet<String>,
    /// GenerationQueries whose subtree has been fully walked.
    done: HashSet<String>,
    /// Non-query dependencies already classified.
    seen: HashSet<DependencyRef>,
    set: DependencySet,
    unready: Vec<DependencyRef>,
}

impl<L: DependencyLister + ?Sized> Walk<'_, L> {
    fn visit_query(&mut self, query: &GenerationQuery) -> Result<(), ValidationError> {
        let name = query.metadata.name.clone();
        self.path.push(name.clone());
        self.on_path.insert(name.clone());

        let deps = query
            .spec
            .static_dependencies()
            .into_iter()
            .chain(query.spec.dynamic_dependencies());
        for dep in deps {
            self.visit_dependency(&name, dep)?;
        }

        self.path.pop();
        self.on_path.remove(&name);
        self.done.insert(name);
        Ok(())
    }

    /// The current path from `name` onwards: only the loop itself, not the
    /// walk that led into it.
    fn loop_from(&self, name: &str) -> Vec<String> {
        let start = self.path.iter().position(|n| n == name).unwrap_or(0);
        self.path[start..].to_vec()
    }

    fn visit_dependency(
        &mut self,
        referenced_by: &str,
        dep: DependencyRef,
    ) -> Result<(), ValidationError> {
        if dep.kind == Kind::GenerationQuery {
            return self.visit_query_dependency(referenced_by, dep);
        }
        if self.seen.contains(&dep) {
            return Ok(());
        }

        let ns = self.namespace;
        let mut built_from = None;
        let ready = match dep.kind {
            Kind::DataSource => self.lister.data_source(ns, &dep.name).map(|d| {
                let ready = d.is_initialized();
                self.set.data_sources.push(d);
                ready
            }),
            Kind::Report => self.lister.report(ns, &dep.name).map(|r| {
                let ready = r.status.table_name.is_some();
                built_from = Some(r.spec.generation_query.clone());
                self.set.reports.push(r);
                ready
            }),
            Kind::ScheduledReport => self.lister.scheduled_report(ns, &dep.name).map(|r| {
                let ready = r.status.table_name.is_some();
                built_from = Some(r.spec.generation_query.clone());
                self.set.scheduled_reports.push(r);
                ready
            }),
            Kind::GenerationQuery => None,
        };

        // a report built from a query already on the path closes a loop
        // through the report's table
        if let Some(query) = built_from.filter(|q| self.on_path.contains(q)) {
            let mut path = self.loop_from(&query);
            path.push(dep.name);
            path.push(query);
            return Err(ValidationError::Cycle { path });
        }

        match ready {
            None => Err(missing(referenced_by, dep)),
            Some(ready) => {
                if !ready {
                    self.unready.push(dep.clone());
                }
                self.seen.insert(dep);
                Ok(())
            }
        }
    }

    fn visit_query_dependency(
        &mut self,
        referenced_by: &str,
        dep: DependencyRef,
    ) -> Result<(), ValidationError> {
        if self.on_path.contains(&dep.name) {
            let mut path = self.loop_from(&dep.name);
            path.push(dep.name);
            return Err(ValidationError::Cycle { path });
        }
        if self.done.contains(&dep.name) {
            return Ok(());
        }

        let Some(query) = self.lister.generation_query(self.namespace, &dep.name) else {
            return Err(missing(referenced_by, dep));
        };
        if !query.is_view_ready() {
            self.unready.push(dep);
        }
        self.set.generation_queries.push(query.clone());
        self.visit_query(&query)
    }
}

fn missing(referenced_by: &str, dependency: DependencyRef) -> ValidationError {
    ValidationError::MissingDependency {
        dependency,
        referenced_by: referenced_by.to_string(),
    }
}
