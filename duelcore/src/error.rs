//! Error taxonomy for duel operations
//!
//! Every failure a command operation can surface is a variant here; selector
//! and reconciliation failures are translated to these at the service
//! boundary and nothing propagates as a panic. `DataUnavailable` is always
//! transient: the caller may retry and no session state has changed.

use thiserror::Error;

use crate::duel::types::UserId;

/// Error type for duel command operations
#[derive(Debug, Error)]
pub enum DuelError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("no linked handle for user(s): {0:?}")]
    HandleNotLinked(Vec<UserId>),

    #[error("a duel between these players is already active")]
    AlreadyActive,

    #[error("maximum of {limit} active duels reached")]
    CapacityExceeded { limit: usize },

    #[error("judge service unavailable: {0}")]
    DataUnavailable(String),

    #[error("not enough unsolved problems around rating {rating}")]
    InsufficientProblems { rating: u32 },

    #[error("user {0} is not in an active duel")]
    NotInSession(UserId),

    #[error("handle `{0}` is already linked to another user")]
    HandleTaken(String),

    #[error("user {0} has no linked handle")]
    NotLinked(UserId),

    #[error("storage error: {0}")]
    Storage(String),
}

impl DuelError {
    /// Whether the caller may simply retry later without changing anything.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DataUnavailable(_))
    }

    pub(crate) fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result type for duel operations
pub type DuelResult<T> = Result<T, DuelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DuelError::DataUnavailable("timeout".into()).is_transient());
        assert!(!DuelError::AlreadyActive.is_transient());
        assert!(!DuelError::CapacityExceeded { limit: 20 }.is_transient());
    }

    #[test]
    fn test_display_names_the_unlinked_users() {
        let err = DuelError::HandleNotLinked(vec![17, 42]);
        let msg = err.to_string();
        assert!(msg.contains("17"));
        assert!(msg.contains("42"));
    }
}
