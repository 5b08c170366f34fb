//! mtr-schemas
//!
//! Data model shared by every reporting crate: object metadata, the
//! `namespace/name` key convention, and the four entity kinds the
//! reconciliation engine reads (GenerationQuery, Report, ScheduledReport,
//! DataSource).
//!
//! Plain data. No IO, no async.

mod meta;
mod object;
mod types;

pub use meta::{KeyError, ObjectKey, ObjectMeta};
pub use object::{AnyObject, Kind, Resource, UnknownKind, WrongKind};
pub use types::*;
