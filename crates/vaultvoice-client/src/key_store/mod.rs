//! Device-local store for passphrase envelopes.
//!
//! One record per session id, never synchronized or sent anywhere. Losing the
//! device loses the submitter's recovery path; the investigator path is
//! unaffected.
//!
//! The trait is synchronous. Every `put` replaces exactly one record in a
//! single atomic write (mutex section or redb write transaction), so writes
//! for one session id are serialized and an abandoned caller never leaves a
//! half-written record.

mod error;
mod memory;
mod redb;

pub use error::KeyStoreError;
pub use memory::MemoryKeyStore;
use serde::{Deserialize, Serialize};
use vaultvoice_core::{PassphraseEnvelope, SessionId};
use vaultvoice_crypto::{Algorithm, EncryptedBlob, decode_base64, encode_base64, encoding};

pub use self::redb::RedbKeyStore;

/// Storage abstraction for passphrase envelopes.
///
/// Must be Clone (shared between coordinator instances), Send + Sync, and
/// synchronous. Implementations share state via Arc, so clones see the same
/// records.
pub trait LocalKeyStore: Clone + Send + Sync + 'static {
    /// Store the envelope for a session. Last write wins.
    fn put(&self, session_id: &SessionId, envelope: &PassphraseEnvelope)
    -> Result<(), KeyStoreError>;

    /// Load the envelope for a session.
    ///
    /// # Errors
    ///
    /// - `NotFound` if this device has no envelope for the session
    fn get(&self, session_id: &SessionId) -> Result<PassphraseEnvelope, KeyStoreError>;

    /// Delete the envelope for a session. Returns whether one existed.
    fn remove(&self, session_id: &SessionId) -> Result<bool, KeyStoreError>;
}

/// On-disk record layout.
///
/// `{ wrappedKeyBase64, saltBase64, nonceBase64, algo }`: ciphertext of the
/// case key, its PBKDF2 salt and AEAD nonce. No plaintext and no raw key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEnvelope {
    /// Base64 AEAD ciphertext of the case key
    pub wrapped_key_base64: String,
    /// Base64 PBKDF2 salt
    pub salt_base64: String,
    /// Base64 AEAD nonce
    pub nonce_base64: String,
    /// AEAD algorithm; records written before the tag existed are AES-GCM
    #[serde(default)]
    pub algo: Algorithm,
}

impl From<&PassphraseEnvelope> for StoredEnvelope {
    fn from(envelope: &PassphraseEnvelope) -> Self {
        Self {
            wrapped_key_base64: encode_base64(&envelope.wrapped_key.ciphertext),
            salt_base64: encode_base64(&envelope.salt),
            nonce_base64: encode_base64(&envelope.wrapped_key.nonce),
            algo: envelope.wrapped_key.algorithm,
        }
    }
}

impl TryFrom<StoredEnvelope> for PassphraseEnvelope {
    type Error = KeyStoreError;

    fn try_from(record: StoredEnvelope) -> Result<Self, Self::Error> {
        let corrupt = |e: vaultvoice_crypto::CryptoError| KeyStoreError::Serialization(e.to_string());

        Ok(Self {
            wrapped_key: EncryptedBlob {
                ciphertext: decode_base64(&record.wrapped_key_base64).map_err(corrupt)?,
                nonce: encoding::decode_base64_array(&record.nonce_base64).map_err(corrupt)?,
                algorithm: record.algo,
            },
            salt: encoding::decode_base64_array(&record.salt_base64).map_err(corrupt)?,
        })
    }
}

/// Encode an envelope as its JSON record.
pub(crate) fn encode_record(envelope: &PassphraseEnvelope) -> Result<Vec<u8>, KeyStoreError> {
    serde_json::to_vec(&StoredEnvelope::from(envelope))
        .map_err(|e| KeyStoreError::Serialization(e.to_string()))
}

/// Decode a JSON record back into an envelope.
pub(crate) fn decode_record(bytes: &[u8]) -> Result<PassphraseEnvelope, KeyStoreError> {
    let record: StoredEnvelope =
        serde_json::from_slice(bytes).map_err(|e| KeyStoreError::Serialization(e.to_string()))?;
    record.try_into()
}

#[cfg(test)]
mod tests {
    use vaultvoice_crypto::{NONCE_SIZE, SALT_SIZE};

    use super::*;

    fn envelope() -> PassphraseEnvelope {
        PassphraseEnvelope {
            wrapped_key: EncryptedBlob {
                ciphertext: vec![0xC0; 48],
                nonce: [0x11; NONCE_SIZE],
                algorithm: Algorithm::Aes256Gcm,
            },
            salt: [0x22; SALT_SIZE],
        }
    }

    #[test]
    fn record_layout_matches_browser_store() {
        let bytes = encode_record(&envelope()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["algo", "nonceBase64", "saltBase64", "wrappedKeyBase64"]);
    }

    #[test]
    fn record_round_trip() {
        let bytes = encode_record(&envelope()).unwrap();
        assert_eq!(decode_record(&bytes).unwrap(), envelope());
    }

    #[test]
    fn legacy_record_without_algo_is_aes_gcm() {
        let json = format!(
            r#"{{"wrappedKeyBase64":"{}","saltBase64":"{}","nonceBase64":"{}"}}"#,
            encode_base64(&[1; 48]),
            encode_base64(&[2; SALT_SIZE]),
            encode_base64(&[3; NONCE_SIZE]),
        );
        let parsed = decode_record(json.as_bytes()).unwrap();
        assert_eq!(parsed.wrapped_key.algorithm, Algorithm::Aes256Gcm);
    }

    #[test]
    fn short_salt_is_serialization_error() {
        let json = format!(
            r#"{{"wrappedKeyBase64":"AA==","saltBase64":"{}","nonceBase64":"{}"}}"#,
            encode_base64(&[2; 8]),
            encode_base64(&[3; NONCE_SIZE]),
        );
        assert!(matches!(decode_record(json.as_bytes()), Err(KeyStoreError::Serialization(_))));
    }
}
