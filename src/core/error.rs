//! Error types for shadow-twin.

use crate::core::types::{RoundId, TwinId};
use thiserror::Error;

/// Result type alias for shadow-twin operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in shadow-twin operations.
///
/// Expected outcomes (rejected votes, failed mint factors, protocol
/// violations) are modeled as values, not errors. The only fatal class is
/// [`Error::AuditAppend`]: losing the audit trail breaks the log-then-act
/// invariant, so a round must fail closed when it occurs.
#[derive(Error, Debug)]
pub enum Error {
    // Consensus errors
    #[error("round {0} already in progress")]
    RoundInProgress(RoundId),

    #[error("round not found: {0}")]
    RoundNotFound(RoundId),

    #[error("twin not in committee: {0}")]
    UnknownTwin(TwinId),

    #[error("committee is empty")]
    EmptyCommittee,

    // Audit errors (fatal for the round that hit them)
    #[error("audit append failed: {0}")]
    AuditAppend(String),

    // Ledger errors (rejected operations, no state change, safe to retry)
    #[error("insufficient balance for {address}: have {balance}, need {requested}")]
    InsufficientBalance {
        address: String,
        balance: f64,
        requested: f64,
    },

    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(f64),

    #[error("burn rate {0} out of range, must be in [0, 1)")]
    InvalidBurnRate(f64),

    // Predictor errors
    #[error("prediction failed: {0}")]
    PredictionFailed(String),

    // Serialization errors
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl Error {
    /// Whether this error aborts a round unconditionally.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::AuditAppend(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_append_is_fatal() {
        assert!(Error::AuditAppend("disk full".into()).is_fatal());
        assert!(!Error::NonPositiveAmount(-1.0).is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = Error::InsufficientBalance {
            address: "alice".into(),
            balance: 10.0,
            requested: 25.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("alice"));
        assert!(msg.contains("25"));
    }
}
