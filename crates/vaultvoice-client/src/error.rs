//! Errors surfaced to coordinator callers.
//!
//! Every lower-layer error is mapped to one of these kinds before it leaves
//! the crate. Two classes must stay apart:
//!
//! - unlock failures ([`SessionError::CouldNotUnlock`]): one generic message,
//!   no hint whether the secret was wrong or the data corrupted
//! - not-found failures ([`SessionError::SessionNotFound`],
//!   [`SessionError::CaseNotFound`]): no secret involved

use thiserror::Error;
use vaultvoice_core::{ApiError, CaseStatus, EnvelopeError};
use vaultvoice_crypto::CryptoError;

use crate::key_store::KeyStoreError;

/// Errors from submitter and investigator sessions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Wrong passphrase, wrong key password, or corrupted envelope.
    #[error("could not unlock: incorrect credential or corrupted data")]
    CouldNotUnlock,

    /// Unknown session id, locally or on the server.
    #[error("case not found")]
    SessionNotFound,

    /// Unknown case id.
    #[error("case not found")]
    CaseNotFound,

    /// Investigator public or private key text is malformed.
    #[error("malformed key encoding: {0}")]
    MalformedKeyEncoding(String),

    /// Operation not valid in the current session state.
    #[error("invalid state: cannot {operation} while {state}")]
    InvalidState {
        /// Current state name
        state: &'static str,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Status change that does not move forward.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidStatusTransition {
        /// Current status
        from: CaseStatus,
        /// Requested status
        to: CaseStatus,
    },

    /// Investigator credentials rejected or token expired.
    #[error("unauthorized")]
    Unauthorized,

    /// Any other collaborator failure.
    #[error("api error: {0}")]
    Api(ApiError),

    /// Local key store I/O failure.
    #[error("key store error: {0}")]
    KeyStore(KeyStoreError),

    /// Primitive failure while encrypting.
    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    /// Blocking key-derivation task did not complete.
    #[error("background task failed: {0}")]
    Task(String),
}

impl SessionError {
    /// Whether this is the generic "could not unlock" failure.
    pub fn is_unlock_failure(&self) -> bool {
        matches!(self, Self::CouldNotUnlock)
    }

    /// Whether the session or case does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound | Self::CaseNotFound)
    }
}

impl From<ApiError> for SessionError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::SessionNotFound => Self::SessionNotFound,
            ApiError::CaseNotFound => Self::CaseNotFound,
            ApiError::Unauthorized => Self::Unauthorized,
            ApiError::InvalidStatusTransition { from, to } => {
                Self::InvalidStatusTransition { from, to }
            },
            other => Self::Api(other),
        }
    }
}

impl From<EnvelopeError> for SessionError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::WrongPassphrase
            | EnvelopeError::WrongKeyPassword
            | EnvelopeError::WrongPrivateKey => Self::CouldNotUnlock,
            EnvelopeError::MalformedKeyEncoding(detail) => Self::MalformedKeyEncoding(detail),
            EnvelopeError::Crypto(e) => Self::Crypto(e),
        }
    }
}

/// A record that no longer decodes is a corrupted envelope and reads as the
/// generic unlock failure. Only database I/O stays distinct.
impl From<KeyStoreError> for SessionError {
    fn from(err: KeyStoreError) -> Self {
        match err {
            KeyStoreError::NotFound => Self::SessionNotFound,
            KeyStoreError::Serialization(_) => Self::CouldNotUnlock,
            io @ KeyStoreError::Io(_) => Self::KeyStore(io),
        }
    }
}

impl From<CryptoError> for SessionError {
    fn from(err: CryptoError) -> Self {
        if err.is_authentication_failure() { Self::CouldNotUnlock } else { Self::Crypto(err) }
    }
}

impl From<tokio::task::JoinError> for SessionError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use vaultvoice_core::UNLOCK_FAILURE_MESSAGE;

    use super::*;

    #[test]
    fn unlock_and_not_found_are_distinct() {
        let unlock = SessionError::from(EnvelopeError::WrongPassphrase);
        let missing = SessionError::from(KeyStoreError::NotFound);

        assert!(unlock.is_unlock_failure() && !unlock.is_not_found());
        assert!(missing.is_not_found() && !missing.is_unlock_failure());
        assert_ne!(unlock.to_string(), missing.to_string());
    }

    #[test]
    fn every_unlock_failure_reads_the_same() {
        for err in [
            EnvelopeError::WrongPassphrase,
            EnvelopeError::WrongKeyPassword,
            EnvelopeError::WrongPrivateKey,
        ] {
            assert_eq!(SessionError::from(err).to_string(), UNLOCK_FAILURE_MESSAGE);
        }
        assert_eq!(
            SessionError::from(CryptoError::Authentication).to_string(),
            UNLOCK_FAILURE_MESSAGE
        );
    }

    #[test]
    fn corrupted_record_is_an_unlock_failure() {
        let corrupted = SessionError::from(KeyStoreError::Serialization(
            "invalid base64: expected 16 decoded bytes, got 3".into(),
        ));
        assert!(corrupted.is_unlock_failure());
        assert_eq!(corrupted.to_string(), UNLOCK_FAILURE_MESSAGE);

        let io = SessionError::from(KeyStoreError::Io("disk full".into()));
        assert!(matches!(io, SessionError::KeyStore(KeyStoreError::Io(_))));
    }

    #[test]
    fn api_errors_map_to_caller_kinds() {
        assert_eq!(SessionError::from(ApiError::SessionNotFound), SessionError::SessionNotFound);
        assert_eq!(SessionError::from(ApiError::Unauthorized), SessionError::Unauthorized);
        assert_eq!(
            SessionError::from(ApiError::InvalidStatusTransition {
                from: CaseStatus::Closed,
                to: CaseStatus::New,
            }),
            SessionError::InvalidStatusTransition { from: CaseStatus::Closed, to: CaseStatus::New }
        );
        assert!(matches!(
            SessionError::from(ApiError::Storage("disk".into())),
            SessionError::Api(ApiError::Storage(_))
        ));
    }
}
