use std::fmt;

use mtr_resolve::ValidationError;
use mtr_schemas::Kind;
use mtr_store::StoreError;
use mtr_view::{TemplateError, ViewError};

/// Why a sync pass failed. The queue decides whether to retry; this only
/// classifies for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Cycle or missing dependency in a GenerationQuery's closure.
    Validation(ValidationError),
    Template(TemplateError),
    /// A Report or ScheduledReport names a GenerationQuery that does not
    /// exist.
    MissingGenerationQuery {
        kind: Kind,
        name: String,
        generation_query: String,
    },
    Store(StoreError),
    View(ViewError),
}

impl SyncError {
    /// Repeating the pass without a spec change can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::View(ViewError::InvalidName(_)) => false,
            SyncError::Store(_) | SyncError::View(_) => true,
            _ => false,
        }
    }

    /// Repeating the pass fails the same way until the spec is edited.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SyncError::Validation(_)
                | SyncError::Template(_)
                | SyncError::MissingGenerationQuery { .. }
                | SyncError::View(ViewError::InvalidName(_))
        )
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Validation(e) => write!(f, "validation failed: {e}"),
            SyncError::Template(e) => write!(f, "validation failed: {e}"),
            SyncError::MissingGenerationQuery {
                kind,
                name,
                generation_query,
            } => write!(
                f,
                "validation failed: {kind} {name:?} references GenerationQuery {generation_query:?} which does not exist"
            ),
            SyncError::Store(e) => write!(f, "{e}"),
            SyncError::View(e) => write!(f, "view creation failed: {e}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<ValidationError> for SyncError {
    fn from(e: ValidationError) -> Self {
        SyncError::Validation(e)
    }
}

impl From<TemplateError> for SyncError {
    fn from(e: TemplateError) -> Self {
        SyncError::Template(e)
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        SyncError::Store(e)
    }
}

impl From<ViewError> for SyncError {
    fn from(e: ViewError) -> Self {
        SyncError::View(e)
    }
}
