//! Engine error types.
//!
//! The math components never fail: out-of-range calibration data is clamped
//! and numerical degeneracies fall back to floors. These errors describe
//! caller contract violations and collaborator failures surfaced by the
//! session orchestrator, so callers can classify them for retry decisions
//! without string matching.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while running an adaptive session.
#[derive(Debug, Error)]
pub enum CatError {
    /// Ability estimation was asked for with neither responses nor a start value.
    #[error("no response history and no initial theta supplied")]
    MissingInitialTheta,

    /// The requested session does not exist.
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    /// The session already completed and is immutable.
    #[error("session {0} is already completed")]
    SessionCompleted(Uuid),

    /// The item is not present in the item bank.
    #[error("item not found: {0}")]
    ItemNotFound(String),

    /// The item was already administered in this session.
    #[error("item {item_id} was already administered in session {session_id}")]
    ItemAlreadyAdministered { session_id: Uuid, item_id: String },

    /// There is no response history to estimate from.
    #[error("no responses found for learner {0}")]
    NoResponses(String),

    /// The stored session changed since it was read.
    #[error("session {session_id} version conflict: expected {expected}, found {found}")]
    VersionConflict {
        session_id: Uuid,
        expected: u64,
        found: u64,
    },

    /// The engine configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A storage collaborator failed.
    #[error(transparent)]
    Store(anyhow::Error),
}

impl CatError {
    /// Returns `true` if re-supplying the same inputs may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CatError::VersionConflict { .. } | CatError::Store(_))
    }
}

impl From<anyhow::Error> for CatError {
    /// Collaborators may wrap a `CatError` (e.g. a version conflict) in
    /// `anyhow`; surface it as the typed variant.
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<CatError>() {
            Ok(cat) => cat,
            Err(other) => CatError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_conflict_is_retryable() {
        let err = CatError::VersionConflict {
            session_id: Uuid::nil(),
            expected: 1,
            found: 2,
        };
        assert!(err.is_retryable());
        assert!(!CatError::MissingInitialTheta.is_retryable());
        assert!(!CatError::ItemNotFound("x".into()).is_retryable());
    }

    #[test]
    fn anyhow_wrapped_cat_error_is_recovered() {
        let wrapped = anyhow::Error::new(CatError::VersionConflict {
            session_id: Uuid::nil(),
            expected: 3,
            found: 4,
        });
        let err: CatError = wrapped.into();
        assert!(matches!(
            err,
            CatError::VersionConflict {
                expected: 3,
                found: 4,
                ..
            }
        ));
    }

    #[test]
    fn foreign_errors_become_store_errors() {
        let err: CatError = anyhow::anyhow!("disk full").into();
        assert!(matches!(err, CatError::Store(_)));
        assert_eq!(err.to_string(), "disk full");
    }
}
