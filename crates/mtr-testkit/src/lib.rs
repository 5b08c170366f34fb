//! mtr-testkit
//!
//! Fakes and fixtures shared by the workspace's scenario tests:
//! a recording [`ViewCreator`](mtr_view::ViewCreator), a fault-injecting
//! store wrapper, and builders for the four kinds.

mod faulty_store;
mod fixtures;
mod recording_views;

pub use faulty_store::FaultyStore;
pub use fixtures::*;
pub use recording_views::{RecordingViewCreator, ViewCall};

use std::time::Duration;

/// Poll `cond` every few milliseconds until it holds or `timeout` passes.
pub async fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut cond: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
