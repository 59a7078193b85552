//! Definitions for error types used throughout core.

use crate::{
    CrError, DbError, RconError, SteamError,
    utils::validation::{FieldError, ValidationErrors},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// database error
    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// client registry error
    #[error("client registry error: {0}")]
    Cr(#[from] CrError),

    /// remote administration error
    #[error("rcon error: {0}")]
    Rcon(#[from] RconError),

    /// steam resolver error
    #[error("steam error: {0}")]
    Steam(#[from] SteamError),

    /// Generic validation error of one field of an entity
    #[error("field validation error: {0}")]
    Field(#[from] FieldError),

    /// Collected validation errors holding stringified field names
    #[error("validation error: {0:?}")]
    Validation(#[from] ValidationErrors),

    /// entity absent
    #[error("not found: {0}")]
    NotFound(String),

    /// state machine guard or cross-entity invariant rejected the operation
    #[error("conflict: {0}")]
    Conflict(String),

    /// bearer or server token missing/mismatched
    #[error("unauthenticated")]
    Unauthenticated,

    /// Parsing error for enums of core
    #[error("parsing error: {0}")]
    ParsingError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Stable machine-readable codes for the API layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Validation,
    NotFound,
    Conflict,
    Stale,
    Unauthenticated,
    Upstream,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Validation => "validation",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Conflict => "conflict",
            ErrorCode::Stale => "stale",
            ErrorCode::Unauthenticated => "unauthenticated",
            ErrorCode::Upstream => "upstream",
            ErrorCode::Internal => "internal",
        }
    }
}

impl CoreError {
    pub fn is_stale(&self) -> bool {
        matches!(self, CoreError::Db(DbError::Stale))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound(_) | CoreError::Db(DbError::NotFound))
    }

    /// Classify into the stable taxonomy surfaced by the API.
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::Field(_) | CoreError::Validation(_) | CoreError::ParsingError(_) => {
                ErrorCode::Validation
            }
            CoreError::NotFound(_) => ErrorCode::NotFound,
            CoreError::Conflict(_) => ErrorCode::Conflict,
            CoreError::Unauthenticated => ErrorCode::Unauthenticated,
            CoreError::Rcon(_) | CoreError::Steam(_) => ErrorCode::Upstream,
            CoreError::Db(db) => match db {
                DbError::Stale => ErrorCode::Stale,
                DbError::NotFound => ErrorCode::NotFound,
                db if db.is_conflict() => ErrorCode::Conflict,
                _ => ErrorCode::Internal,
            },
            CoreError::Cr(_) => ErrorCode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_errors_map_to_the_spec_taxonomy() {
        assert_eq!(CoreError::Db(DbError::Stale).code(), ErrorCode::Stale);
        assert_eq!(CoreError::Db(DbError::NotFound).code(), ErrorCode::NotFound);
        assert_eq!(
            CoreError::Db(DbError::UniqueViolation(None)).code(),
            ErrorCode::Conflict
        );
        assert_eq!(CoreError::Db(DbError::Unavailable).code(), ErrorCode::Internal);
        assert_eq!(CoreError::Conflict("x".into()).code(), ErrorCode::Conflict);
        assert_eq!(
            CoreError::Rcon(RconError::Timeout).code(),
            ErrorCode::Upstream
        );
    }
}
