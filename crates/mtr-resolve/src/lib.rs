//! mtr-resolve
//!
//! Dependency resolution for GenerationQueries.
//!
//! Deterministic, pure logic. No IO: objects are read through a
//! [`DependencyLister`] the caller backs with its cache.

mod engine;
mod types;

pub use engine::resolve;
pub use types::*;
