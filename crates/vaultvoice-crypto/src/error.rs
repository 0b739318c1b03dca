//! Error types for the primitive layer.

use thiserror::Error;

/// Errors produced by the VaultVoice cryptographic primitives.
///
/// Callers that surface these to end users must not distinguish
/// [`CryptoError::Authentication`] from [`CryptoError::Unwrap`]: both mean
/// "wrong secret or corrupted data" and nothing more.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// AEAD tag mismatch: wrong key, tampered ciphertext or tampered nonce.
    #[error("authentication failed")]
    Authentication,

    /// RSA-OAEP decryption failed with a well-formed key.
    #[error("key unwrap failed")]
    Unwrap,

    /// Public or private key text could not be parsed.
    ///
    /// This is a caller bug (bad configuration or bad input), never a
    /// credential failure.
    #[error("malformed key encoding: {0}")]
    MalformedKeyEncoding(String),

    /// Salt passed to password derivation has the wrong size.
    #[error("invalid salt length: expected {expected} bytes, got {got}")]
    InvalidSaltLength {
        /// Required salt size
        expected: usize,
        /// Size that was supplied
        got: usize,
    },

    /// Raw key material has the wrong size.
    #[error("invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength {
        /// Required key size
        expected: usize,
        /// Size that was supplied
        got: usize,
    },

    /// Nonce has the wrong size.
    #[error("invalid nonce length: expected {expected} bytes, got {got}")]
    InvalidNonceLength {
        /// Required nonce size
        expected: usize,
        /// Size that was supplied
        got: usize,
    },

    /// Base64 input could not be decoded.
    #[error("invalid base64: {0}")]
    Encoding(String),

    /// The OS random number generator failed.
    #[error("random number generation failed: {0}")]
    Rng(String),

    /// RSA key pair generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// An underlying primitive failed on encryption.
    ///
    /// Treated as fatal; there is no retry that could succeed.
    #[error("primitive failure: {0}")]
    Primitive(String),
}

impl CryptoError {
    /// Whether this error means "wrong secret or tampered data".
    ///
    /// Both AEAD and RSA unwrap failures fall in this class.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::Authentication | Self::Unwrap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_failures_are_classified_together() {
        assert!(CryptoError::Authentication.is_authentication_failure());
        assert!(CryptoError::Unwrap.is_authentication_failure());
        assert!(!CryptoError::MalformedKeyEncoding("x".into()).is_authentication_failure());
        assert!(
            !CryptoError::InvalidSaltLength { expected: 16, got: 3 }.is_authentication_failure()
        );
    }

    #[test]
    fn display_does_not_leak_detail_for_auth_failures() {
        assert_eq!(CryptoError::Authentication.to_string(), "authentication failed");
        assert_eq!(
            CryptoError::InvalidSaltLength { expected: 16, got: 8 }.to_string(),
            "invalid salt length: expected 16 bytes, got 8"
        );
    }
}
