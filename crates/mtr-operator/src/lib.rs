//! mtr-operator
//!
//! The reconciliation engine. One queue and one worker pool per kind, fed
//! by informers over the resource store. A GenerationQuery pass resolves
//! dependencies, materializes the view once everything it needs is ready,
//! records the view name in status, and re-queues every dependent.
//!
//! Correctness does not depend on processing order: an unready dependency
//! defers the pass, and the dependency's own successful pass re-queues its
//! dependents.

mod error;
mod lister;
mod materialize;
mod propagate;
mod queues;
mod reporting;
mod sync;

pub use error::SyncError;
pub use lister::CacheLister;
pub use materialize::MaterializeOutcome;
pub use propagate::PropagationReport;
pub use queues::Queues;
pub use reporting::Reporting;
