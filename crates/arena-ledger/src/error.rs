//! Workflow error taxonomy.
//!
//! Every settlement workflow returns `WorkflowError` on failure. All
//! variants except `Internal` are expected, user-facing outcomes; the
//! boundary maps `status()` to a transport status code and `Internal`
//! detail is logged server-side only.

use arena_core::db::DatabaseError;
use thiserror::Error;

/// Errors produced by settlement workflows and boundary checks.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Malformed or missing fields; the caller's fault, not retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Business-rule violation (already joined, already processed,
    /// tournament full, code expired, ...); not retried.
    #[error("{0}")]
    Conflict(String),

    /// Wallet balance cannot cover the requested amount.
    #[error("Insufficient balance")]
    InsufficientFunds,

    /// Missing or invalid identity.
    #[error("Not authorized")]
    Unauthorized,

    /// Identity is known but not permitted.
    #[error("{0}")]
    Forbidden(String),

    /// Storage failure or unexpected state; surfaced as opaque.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Transport-agnostic status classification of a workflow outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Ok,
    InvalidInput,
    NotFound,
    Conflict,
    Unauthorized,
    Forbidden,
    Internal,
}

impl WorkflowError {
    /// Classify this error for the boundary layer.
    pub const fn status(&self) -> StatusClass {
        match self {
            Self::InvalidInput(_) => StatusClass::InvalidInput,
            Self::NotFound(_) => StatusClass::NotFound,
            // InsufficientFunds is a user-correctable Conflict subtype.
            Self::Conflict(_) | Self::InsufficientFunds => StatusClass::Conflict,
            Self::Unauthorized => StatusClass::Unauthorized,
            Self::Forbidden(_) => StatusClass::Forbidden,
            Self::Internal(_) => StatusClass::Internal,
        }
    }

    /// Message safe to return to the caller. Internal detail stays
    /// server-side.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "Server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for WorkflowError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            // Storage-enforced uniqueness (participant and redemption rows)
            // closes the check-then-insert race; surface it as a conflict.
            if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) {
                return Self::Conflict("Duplicate record".to_string());
            }
        }
        Self::Internal(e.to_string())
    }
}

impl From<DatabaseError> for WorkflowError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound(what) => Self::NotFound(what),
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_funds_classifies_as_conflict() {
        assert_eq!(WorkflowError::InsufficientFunds.status(), StatusClass::Conflict);
    }

    #[test]
    fn internal_detail_is_not_public() {
        let err = WorkflowError::Internal("disk on fire".to_string());
        assert_eq!(err.public_message(), "Server error");
        assert!(err.to_string().contains("disk on fire"));
    }

    #[test]
    fn database_not_found_maps_to_not_found() {
        let err = WorkflowError::from(DatabaseError::NotFound("Wallet x".to_string()));
        assert_eq!(err.status(), StatusClass::NotFound);
    }
}
