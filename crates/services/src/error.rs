//! Shared error types for the services crate.

use thiserror::Error;

use study_core::model::CardId;
use study_storage::ApiError;

use crate::sessions::SessionStatus;

/// Errors emitted by `OutcomeRecorder`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RecordError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("study record task stopped before completing")]
    Aborted,
}

/// Errors emitted by `SessionRunner`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("cannot {action} while the session is {status}")]
    InvalidTransition {
        action: &'static str,
        status: SessionStatus,
    },
    #[error("the outcome for card {card_id} is still being recorded")]
    AnswerPending { card_id: CardId },
    #[error(transparent)]
    Select(#[from] ApiError),
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl SessionError {
    /// Whether the failure came from a missing credential.
    #[must_use]
    pub fn is_authentication_required(&self) -> bool {
        matches!(
            self,
            SessionError::Select(ApiError::AuthenticationRequired)
                | SessionError::Record(RecordError::Api(ApiError::AuthenticationRequired))
        )
    }
}
