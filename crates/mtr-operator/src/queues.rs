use std::collections::BTreeMap;

use mtr_config::RequeueConfig;
use mtr_queue::{Backoff, WorkQueue};
use mtr_schemas::{Kind, ObjectKey};

/// One work queue per kind.
#[derive(Debug, Clone)]
pub struct Queues {
    pub generation_queries: WorkQueue,
    pub reports: WorkQueue,
    pub scheduled_reports: WorkQueue,
    pub data_sources: WorkQueue,
}

impl Queues {
    pub fn new(requeue: &RequeueConfig) -> Self {
        let backoff = Backoff::new(requeue.base_delay(), requeue.max_delay());
        let q = |kind: Kind| WorkQueue::new(kind.as_str(), backoff);
        Self {
            generation_queries: q(Kind::GenerationQuery),
            reports: q(Kind::Report),
            scheduled_reports: q(Kind::ScheduledReport),
            data_sources: q(Kind::DataSource),
        }
    }

    pub fn get(&self, kind: Kind) -> &WorkQueue {
        match kind {
            Kind::GenerationQuery => &self.generation_queries,
            Kind::Report => &self.reports,
            Kind::ScheduledReport => &self.scheduled_reports,
            Kind::DataSource => &self.data_sources,
        }
    }

    pub fn add(&self, kind: Kind, key: &ObjectKey) {
        self.get(kind).add(key.to_string());
    }

    /// Pending keys per kind.
    pub fn depths(&self) -> BTreeMap<Kind, usize> {
        Kind::ALL.iter().map(|k| (*k, self.get(*k).len())).collect()
    }

    pub fn shut_down(&self) {
        for kind in Kind::ALL {
            self.get(kind).shut_down();
        }
    }
}
