//! mtr-view
//!
//! Everything needed to turn a resolved GenerationQuery into a database
//! view: the deterministic view name, the query template renderer, and the
//! query-engine client that issues `CREATE OR REPLACE VIEW`.

mod naming;
mod presto;
mod render;

pub use naming::{generation_query_view_name, is_valid_identifier};
pub use presto::{PrestoViewCreator, ViewCreator, ViewError};
pub use render::{QueryRenderer, TemplateError, VIEW_NAME_HELPER};
