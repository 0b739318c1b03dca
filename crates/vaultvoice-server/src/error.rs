//! Service error types.

use std::fmt;

use crate::storage::StorageError;

/// Errors that can occur while setting up or running the case service.
///
/// Request-level failures are reported to callers as
/// [`ApiError`](vaultvoice_core::ApiError); this type covers what happens
/// around them.
#[derive(Debug)]
pub enum ServiceError {
    /// Configuration error (missing or malformed config file, bad public key).
    ///
    /// Fatal at startup. Fix configuration and restart.
    Config(String),

    /// Storage error while opening or scanning the case database.
    Storage(StorageError),

    /// Filesystem error outside the case database (config and key files).
    Io(String),

    /// Key generation or sealing failed.
    Crypto(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Crypto(msg) => write!(f, "crypto error: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<vaultvoice_crypto::CryptoError> for ServiceError {
    fn from(err: vaultvoice_crypto::CryptoError) -> Self {
        Self::Crypto(err.to_string())
    }
}
