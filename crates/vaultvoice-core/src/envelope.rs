//! Case Key Envelope Manager.
//!
//! One case key, two independent ways back to it:
//!
//! ```text
//!              ┌──────────── CaseKey ────────────┐
//!              │                                 │
//!   PBKDF2(passphrase, salt) + AEAD     RSA-OAEP(investigator public key)
//!              │                                 │
//!              ▼                                 ▼
//!     PassphraseEnvelope                 InvestigatorEnvelope
//!     (submitter device only)            (server case record)
//! ```
//!
//! The two envelope types stay separate on purpose. Opening one never helps
//! open the other, and neither holder can produce the other's envelope.
//!
//! The investigator's private key has its own password-sealed form,
//! [`SealedPrivateKey`], built the same way as the passphrase envelope but over
//! PKCS#8 DER bytes instead of a case key.

use std::fmt;

use serde::{Deserialize, Serialize};
use vaultvoice_crypto::{
    CryptoError, EncryptedBlob, InvestigatorPrivateKey, InvestigatorPublicKey, SALT_SIZE,
    SymmetricKey, aead_decrypt, aead_encrypt, asymmetric_unwrap, asymmetric_wrap,
    derive_key_from_password, encoding::base64_array, encoding::base64_bytes, generate_salt,
    generate_symmetric_key,
};

use crate::error::EnvelopeError;

/// The per-case symmetric key.
///
/// Lives only in memory, is rebuilt from an envelope on every access, and is
/// zeroized when dropped. Not `Clone`, not printable.
pub struct CaseKey(SymmetricKey);

impl CaseKey {
    /// Generate a fresh random case key.
    pub fn generate() -> Result<Self, EnvelopeError> {
        Ok(Self(generate_symmetric_key()?))
    }

    /// Wrap an existing symmetric key.
    pub fn from_symmetric(key: SymmetricKey) -> Self {
        Self(key)
    }

    /// The key for AEAD operations.
    pub fn symmetric(&self) -> &SymmetricKey {
        &self.0
    }

    /// Constant-time equality.
    pub fn ct_eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0)
    }
}

impl fmt::Debug for CaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CaseKey(..)")
    }
}

/// Case key sealed under a passphrase. Stored on the submitter's device only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassphraseEnvelope {
    /// AEAD ciphertext of the raw case key
    pub wrapped_key: EncryptedBlob,
    /// PBKDF2 salt, fixed for the life of the envelope
    #[serde(with = "base64_array")]
    pub salt: [u8; SALT_SIZE],
}

/// Case key wrapped under the investigator's RSA public key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigatorEnvelope {
    /// RSA-OAEP ciphertext of the raw case key
    #[serde(with = "base64_bytes")]
    pub wrapped_key: Vec<u8>,
}

impl InvestigatorEnvelope {
    /// Base64 form used on the wire (`wrappedCaseKey`).
    pub fn to_base64(&self) -> String {
        vaultvoice_crypto::encode_base64(&self.wrapped_key)
    }

    /// Parse the base64 wire form.
    pub fn from_base64(text: &str) -> Result<Self, CryptoError> {
        Ok(Self { wrapped_key: vaultvoice_crypto::decode_base64(text)? })
    }
}

impl fmt::Debug for InvestigatorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvestigatorEnvelope").field("len", &self.wrapped_key.len()).finish()
    }
}

/// Investigator private key (PKCS#8 DER) sealed under a key password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedPrivateKey {
    /// AEAD ciphertext of the PKCS#8 DER private key
    pub wrapped_key: EncryptedBlob,
    /// PBKDF2 salt
    #[serde(with = "base64_array")]
    pub salt: [u8; SALT_SIZE],
}

/// Seal a case key under a passphrase.
///
/// Returns the envelope and the passphrase-derived key. Callers that do not
/// need the derived key should drop it immediately.
pub fn create_envelopes(
    case_key: &CaseKey,
    password: &str,
) -> Result<(PassphraseEnvelope, SymmetricKey), EnvelopeError> {
    let salt = generate_salt()?;
    let derived = derive_key_from_password(password, &salt)?;
    let wrapped_key = aead_encrypt(case_key.symmetric().as_bytes(), &derived)?;

    Ok((PassphraseEnvelope { wrapped_key, salt }, derived))
}

/// Wrap a case key for the investigator holding `public_key_pem`.
///
/// # Errors
///
/// - `MalformedKeyEncoding` if the PEM text is not an SPKI RSA public key
pub fn wrap_for_investigator(
    case_key: &CaseKey,
    public_key_pem: &str,
) -> Result<InvestigatorEnvelope, EnvelopeError> {
    let public_key = InvestigatorPublicKey::from_pem(public_key_pem).map_err(malformed)?;
    let wrapped_key = asymmetric_wrap(case_key.symmetric().as_bytes(), &public_key)?;
    Ok(InvestigatorEnvelope { wrapped_key })
}

/// Recover the case key from a passphrase envelope.
///
/// # Errors
///
/// - `WrongPassphrase` for a wrong passphrase or any corruption of the
///   envelope. The two are deliberately indistinguishable.
pub fn open_passphrase_envelope(
    envelope: &PassphraseEnvelope,
    password: &str,
) -> Result<CaseKey, EnvelopeError> {
    let derived = derive_key_from_password(password, &envelope.salt)
        .map_err(|_| EnvelopeError::WrongPassphrase)?;
    let raw = aead_decrypt(&envelope.wrapped_key, &derived)
        .map(vaultvoice_crypto::Zeroizing::new)
        .map_err(|_| EnvelopeError::WrongPassphrase)?;

    SymmetricKey::from_slice(&raw)
        .map(CaseKey)
        .map_err(|_| EnvelopeError::WrongPassphrase)
}

/// Recover the case key from an investigator envelope.
///
/// # Errors
///
/// - `WrongPrivateKey` if the key does not match or the envelope is corrupted
pub fn open_investigator_envelope(
    envelope: &InvestigatorEnvelope,
    private_key: &InvestigatorPrivateKey,
) -> Result<CaseKey, EnvelopeError> {
    let raw = asymmetric_unwrap(&envelope.wrapped_key, private_key)
        .map_err(|_| EnvelopeError::WrongPrivateKey)?;

    SymmetricKey::from_slice(&raw)
        .map(CaseKey)
        .map_err(|_| EnvelopeError::WrongPrivateKey)
}

/// Seal an investigator private key under a key password.
pub fn seal_private_key(
    private_key: &InvestigatorPrivateKey,
    key_password: &str,
) -> Result<SealedPrivateKey, EnvelopeError> {
    let der = private_key.to_pkcs8_der().map_err(malformed)?;
    let salt = generate_salt()?;
    let derived = derive_key_from_password(key_password, &salt)?;
    let wrapped_key = aead_encrypt(&der, &derived)?;

    Ok(SealedPrivateKey { wrapped_key, salt })
}

/// Recover an investigator private key from its sealed form.
///
/// # Errors
///
/// - `WrongKeyPassword` for a wrong password or a corrupted store
/// - `MalformedKeyEncoding` if the store opens but does not hold a PKCS#8 key
pub fn unwrap_private_key(
    sealed: &SealedPrivateKey,
    key_password: &str,
) -> Result<InvestigatorPrivateKey, EnvelopeError> {
    let derived = derive_key_from_password(key_password, &sealed.salt)
        .map_err(|_| EnvelopeError::WrongKeyPassword)?;
    let der = aead_decrypt(&sealed.wrapped_key, &derived)
        .map(vaultvoice_crypto::Zeroizing::new)
        .map_err(|_| EnvelopeError::WrongKeyPassword)?;

    InvestigatorPrivateKey::from_pkcs8_der(&der).map_err(malformed)
}

fn malformed(err: CryptoError) -> EnvelopeError {
    match err {
        CryptoError::MalformedKeyEncoding(detail) => EnvelopeError::MalformedKeyEncoding(detail),
        other => EnvelopeError::Crypto(other),
    }
}
