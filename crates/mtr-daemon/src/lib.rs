//! mtr-daemon library target.
//!
//! Exposes the router, state and manifest loader for integration tests.
//! The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod manifests;
pub mod routes;
pub mod state;
