use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use mtr_view::{ViewCreator, ViewError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewCall {
    pub name: String,
    pub query: String,
}

/// In-memory query engine: records every create-or-replace call and keeps
/// the latest definition per view. Failures can be queued up front.
#[derive(Default)]
pub struct RecordingViewCreator {
    calls: Mutex<Vec<ViewCall>>,
    views: Mutex<BTreeMap<String, String>>,
    failures: Mutex<VecDeque<ViewError>>,
}

impl RecordingViewCreator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next call with `err`. Queued failures are used in order.
    pub fn fail_next(&self, err: ViewError) {
        self.failures.lock().unwrap().push_back(err);
    }

    /// Every call, including failed ones, in order.
    pub fn calls(&self) -> Vec<ViewCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, name: &str) -> Vec<ViewCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.name == name)
            .collect()
    }

    /// Current definition of every successfully created view.
    pub fn views(&self) -> BTreeMap<String, String> {
        self.views.lock().unwrap().clone()
    }

    pub fn view(&self, name: &str) -> Option<String> {
        self.views.lock().unwrap().get(name).cloned()
    }
}

#[async_trait]
impl ViewCreator for RecordingViewCreator {
    async fn create_or_replace_view(&self, name: &str, query: &str) -> Result<(), ViewError> {
        self.calls.lock().unwrap().push(ViewCall {
            name: name.to_string(),
            query: query.to_string(),
        });
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.views
            .lock()
            .unwrap()
            .insert(name.to_string(), query.to_string());
        Ok(())
    }
}
