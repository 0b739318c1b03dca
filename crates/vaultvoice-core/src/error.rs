//! Error types for the VaultVoice core.
//!
//! Strongly-typed errors for each layer: envelope unlocking, identifier and
//! status parsing, case status transitions, and the collaborator API.
//!
//! Unlock failures (wrong passphrase, wrong key password, wrong private key)
//! all render the same message. Which secret was wrong, or whether the data
//! was tampered with instead, is never observable from the error.

use thiserror::Error;
use vaultvoice_crypto::CryptoError;

use crate::model::CaseStatus;

/// User-facing text for every unlock failure.
pub const UNLOCK_FAILURE_MESSAGE: &str =
    "could not unlock: incorrect credential or corrupted data";

/// Errors from creating or opening key envelopes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Passphrase envelope did not open: wrong passphrase or corrupted
    /// envelope.
    #[error("could not unlock: incorrect credential or corrupted data")]
    WrongPassphrase,

    /// Sealed private key did not open: wrong key password or corrupted
    /// store.
    #[error("could not unlock: incorrect credential or corrupted data")]
    WrongKeyPassword,

    /// Investigator envelope did not open with the supplied private key.
    #[error("could not unlock: incorrect credential or corrupted data")]
    WrongPrivateKey,

    /// Public or private key text could not be parsed.
    #[error("malformed key encoding: {0}")]
    MalformedKeyEncoding(String),

    /// Primitive failure while creating an envelope.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl EnvelopeError {
    /// Whether this is a credential failure ("could not unlock").
    pub fn is_unlock_failure(&self) -> bool {
        matches!(self, Self::WrongPassphrase | Self::WrongKeyPassword | Self::WrongPrivateKey)
    }
}

/// Text that is not a valid identifier or status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Identifier is not 32 hex characters.
    #[error("invalid identifier")]
    InvalidId,

    /// Unknown case status name.
    #[error("unknown case status: {0}")]
    UnknownStatus(String),
}

/// A case status change that does not move forward.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid status transition: {from} -> {to}")]
pub struct TransitionError {
    /// Current status
    pub from: CaseStatus,
    /// Requested status
    pub to: CaseStatus,
}

/// Errors returned by a [`CaseApi`](crate::api::CaseApi) collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No case for this session id.
    #[error("case not found")]
    SessionNotFound,

    /// No case for this case id.
    #[error("case not found")]
    CaseNotFound,

    /// Missing, expired or invalid investigator credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Status change rejected because it does not move forward.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidStatusTransition {
        /// Current status
        from: CaseStatus,
        /// Requested status
        to: CaseStatus,
    },

    /// Request conflicts with existing state (duplicate report or item id).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Request is well-formed JSON but semantically invalid.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Collaborator storage failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl ApiError {
    /// Whether the addressed session or case does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound | Self::CaseNotFound)
    }

    /// HTTP status code this error maps to on the wire.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::SessionNotFound | Self::CaseNotFound => 404,
            Self::Unauthorized => 401,
            Self::InvalidStatusTransition { .. } | Self::Conflict(_) => 409,
            Self::InvalidRequest(_) => 400,
            Self::Storage(_) => 500,
        }
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        Self::InvalidStatusTransition { from: err.from, to: err.to }
    }
}
