//! Key store errors.

use thiserror::Error;

/// Errors from a [`LocalKeyStore`](super::LocalKeyStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyStoreError {
    /// No envelope for this session on this device
    #[error("no envelope stored for this session")]
    NotFound,

    /// Underlying database failure
    #[error("key store I/O error: {0}")]
    Io(String),

    /// Record could not be encoded or decoded
    #[error("key store serialization error: {0}")]
    Serialization(String),
}

impl KeyStoreError {
    /// Whether the session simply has no record here.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}
