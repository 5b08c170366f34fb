//! mtr-queue
//!
//! Per-kind work queues and the worker pools draining them.
//!
//! A key is pending at most once: re-adding a pending key is a no-op, and a
//! key re-added while a worker holds it is queued exactly once more when
//! that worker calls `done`. Two workers never hold the same key.

mod backoff;
mod queue;
mod worker;

pub use backoff::Backoff;
pub use queue::WorkQueue;
pub use worker::{process_item, spawn_workers, ItemOutcome, SyncHandler, WorkerOptions};
