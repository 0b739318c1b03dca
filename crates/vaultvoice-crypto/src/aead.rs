//! Authenticated encryption for thread items and key envelopes.
//!
//! Every call to [`aead_encrypt`] draws a fresh 12-byte nonce from the OS
//! CSPRNG. With 96-bit random nonces the collision bound stays negligible for
//! far more messages than a single case will ever hold.
//!
//! No associated data is bound: blobs must stay decryptable by the browser
//! client, which encrypts with a bare `AES-GCM` `{ iv }` parameter set.

use aes_gcm::{
    Aes256Gcm,
    aead::{Aead, KeyInit},
};
use chacha20poly1305::ChaCha20Poly1305;
use serde::{Deserialize, Serialize};

use crate::{error::CryptoError, key::SymmetricKey};

/// Nonce size shared by both supported AEADs (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size shared by both supported AEADs.
pub const TAG_SIZE: usize = 16;

/// AEAD algorithm tag carried in every [`EncryptedBlob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Algorithm {
    /// AES-256-GCM. The default, and what browser clients produce.
    #[default]
    #[serde(rename = "AES-GCM")]
    Aes256Gcm,
    /// ChaCha20-Poly1305 (RFC 8439), for devices without AES acceleration.
    #[serde(rename = "CHACHA20-POLY1305")]
    ChaCha20Poly1305,
}

impl Algorithm {
    /// Wire name of the algorithm.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aes256Gcm => "AES-GCM",
            Self::ChaCha20Poly1305 => "CHACHA20-POLY1305",
        }
    }
}

/// Ciphertext plus the nonce and algorithm needed to open it.
///
/// JSON form: `{ "ciphertextBase64": .., "nonceBase64": .., "algo": .. }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    /// Ciphertext including the 16-byte authentication tag
    #[serde(rename = "ciphertextBase64", with = "crate::encoding::base64_bytes")]
    pub ciphertext: Vec<u8>,
    /// The nonce used for this encryption, unique per key
    #[serde(rename = "nonceBase64", with = "crate::encoding::base64_array")]
    pub nonce: [u8; NONCE_SIZE],
    /// Algorithm that produced the ciphertext
    #[serde(rename = "algo", default)]
    pub algorithm: Algorithm,
}

impl EncryptedBlob {
    /// Plaintext length (ciphertext length minus authentication tag).
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(TAG_SIZE)
    }
}

/// Encrypt with the default algorithm (AES-256-GCM) and a fresh nonce.
pub fn aead_encrypt(plaintext: &[u8], key: &SymmetricKey) -> Result<EncryptedBlob, CryptoError> {
    aead_encrypt_with(Algorithm::default(), plaintext, key)
}

/// Encrypt with an explicit algorithm and a fresh nonce.
///
/// # Errors
///
/// - `Rng` if the OS RNG fails
/// - `Primitive` if the cipher rejects the input (treated as fatal)
pub fn aead_encrypt_with(
    algorithm: Algorithm,
    plaintext: &[u8],
    key: &SymmetricKey,
) -> Result<EncryptedBlob, CryptoError> {
    let nonce = generate_nonce()?;

    let ciphertext = match algorithm {
        Algorithm::Aes256Gcm => Aes256Gcm::new(key.as_bytes().into())
            .encrypt(aes_gcm::Nonce::from_slice(&nonce), plaintext),
        Algorithm::ChaCha20Poly1305 => ChaCha20Poly1305::new(key.as_bytes().into())
            .encrypt(chacha20poly1305::Nonce::from_slice(&nonce), plaintext),
    }
    .map_err(|e| CryptoError::Primitive(e.to_string()))?;

    Ok(EncryptedBlob { ciphertext, nonce, algorithm })
}

/// Decrypt and authenticate a blob.
///
/// # Errors
///
/// - `Authentication` on any tag mismatch: wrong key, flipped ciphertext bit,
///   flipped nonce bit, or truncated ciphertext. No plaintext is released.
pub fn aead_decrypt(blob: &EncryptedBlob, key: &SymmetricKey) -> Result<Vec<u8>, CryptoError> {
    if blob.ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::Authentication);
    }

    match blob.algorithm {
        Algorithm::Aes256Gcm => Aes256Gcm::new(key.as_bytes().into())
            .decrypt(aes_gcm::Nonce::from_slice(&blob.nonce), blob.ciphertext.as_slice()),
        Algorithm::ChaCha20Poly1305 => ChaCha20Poly1305::new(key.as_bytes().into())
            .decrypt(chacha20poly1305::Nonce::from_slice(&blob.nonce), blob.ciphertext.as_slice()),
    }
    .map_err(|_| CryptoError::Authentication)
}

/// Draw a random 12-byte nonce from the OS CSPRNG.
pub fn generate_nonce() -> Result<[u8; NONCE_SIZE], CryptoError> {
    let mut nonce = [0u8; NONCE_SIZE];
    getrandom::fill(&mut nonce).map_err(|e| CryptoError::Rng(e.to_string()))?;
    Ok(nonce)
}
