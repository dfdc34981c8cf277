//! Access Engine Error Types

use uam_common::{ParseObjectTypeError, ParseScopeError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// Malformed input rejected at the point of assignment.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A group or object referenced by a management operation does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The group store is unreachable or rejected a write.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A group with the same name already exists.
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl AccessError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Stable machine-readable code, used in bulk failure summaries.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Persistence(_) => "persistence_error",
            Self::Conflict(_) => "conflict",
        }
    }
}

impl From<sqlx::Error> for AccessError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = %err, "Group store database error");
        Self::Persistence(err.to_string())
    }
}

impl From<ParseScopeError> for AccessError {
    fn from(err: ParseScopeError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<ParseObjectTypeError> for AccessError {
    fn from(err: ParseObjectTypeError) -> Self {
        Self::Validation(err.to_string())
    }
}

pub type AccessResult<T> = Result<T, AccessError>;
