use std::fmt;
use thiserror::Error;

/// Failures raised by a document store backend.
#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("document encoding error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("store connection lock poisoned")]
    Poisoned,
}

/// What is still pointing at a category that was asked to be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dependents {
    Children,
    Templates,
}

impl fmt::Display for Dependents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Children => write!(f, "child categories"),
            Self::Templates => write!(f, "service templates"),
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum Error {
    #[error("invalid parameter '{field}': {reason}")]
    InvalidParams { field: &'static str, reason: String },

    #[error("service category not found: {id}")]
    NotFound { id: i64 },

    #[error("operation forbidden on built-in service category {id}")]
    OperationForbidden { id: i64 },

    #[error("service category {id} is still referenced by {count} {dependents}")]
    HasDependents {
        id: i64,
        dependents: Dependents,
        count: u64,
    },

    #[error("{field} already exists: {value}")]
    AlreadyExists { field: &'static str, value: String },

    #[error("service category {id} kept changing while being modified")]
    Conflict { id: i64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            field,
            reason: reason.into(),
        }
    }

    /// Stable classification code, used in logs and CLI output.
    pub(crate) fn code(&self) -> &'static str {
        match self {
            Self::InvalidParams { .. } => "invalid_params",
            Self::NotFound { .. } => "not_found",
            Self::OperationForbidden { .. } => "operation_forbidden",
            Self::HasDependents { .. } => "has_dependents",
            Self::AlreadyExists { .. } => "already_exists",
            Self::Conflict { .. } => "conflict",
            Self::Store(_) => "store_failure",
        }
    }
}
