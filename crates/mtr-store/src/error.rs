use std::fmt;

use mtr_schemas::{Kind, ObjectKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound {
        kind: Kind,
        key: ObjectKey,
    },
    AlreadyExists {
        kind: Kind,
        key: ObjectKey,
    },
    /// The object changed since it was read.
    Conflict {
        kind: Kind,
        key: ObjectKey,
        expected: u64,
        actual: u64,
    },
    Invalid(String),
    /// The store could not serve the request (transport, injected fault).
    Unavailable(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound { kind, key } => write!(f, "{kind} \"{key}\" not found"),
            StoreError::AlreadyExists { kind, key } => {
                write!(f, "{kind} \"{key}\" already exists")
            }
            StoreError::Conflict {
                kind,
                key,
                expected,
                actual,
            } => write!(
                f,
                "conflict updating {kind} \"{key}\": have version {expected}, store has {actual}"
            ),
            StoreError::Invalid(msg) => write!(f, "invalid object: {msg}"),
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}
