use thiserror::Error;
use vaultvoice_core::{ApiError, TransitionError};

/// Errors from [`CaseStorage`](super::CaseStorage) implementations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// No record for the addressed case or session.
    #[error("case not found")]
    NotFound,

    /// Write rejected because it would overwrite existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Status change that does not move forward.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Backend I/O failure.
    #[error("storage I/O error: {0}")]
    Io(String),

    /// Stored bytes could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Map to the wire error for a case addressed by session id.
    pub fn for_session(self) -> ApiError {
        match self {
            Self::NotFound => ApiError::SessionNotFound,
            other => other.into_api(),
        }
    }

    /// Map to the wire error for a case addressed by case id.
    pub fn for_case(self) -> ApiError {
        match self {
            Self::NotFound => ApiError::CaseNotFound,
            other => other.into_api(),
        }
    }

    fn into_api(self) -> ApiError {
        match self {
            Self::NotFound => ApiError::CaseNotFound,
            Self::Conflict(detail) => ApiError::Conflict(detail),
            Self::Transition(err) => err.into(),
            Self::Io(detail) | Self::Serialization(detail) => ApiError::Storage(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use vaultvoice_core::CaseStatus;

    use super::*;

    #[test]
    fn not_found_follows_the_addressing_handle() {
        assert_eq!(StorageError::NotFound.for_session(), ApiError::SessionNotFound);
        assert_eq!(StorageError::NotFound.for_case(), ApiError::CaseNotFound);
    }

    #[test]
    fn backend_detail_becomes_storage_error() {
        assert_eq!(
            StorageError::Io("disk full".into()).for_case(),
            ApiError::Storage("disk full".into())
        );
        let transition = TransitionError { from: CaseStatus::Closed, to: CaseStatus::New };
        assert_eq!(
            StorageError::from(transition).for_case(),
            ApiError::InvalidStatusTransition { from: CaseStatus::Closed, to: CaseStatus::New }
        );
    }
}
