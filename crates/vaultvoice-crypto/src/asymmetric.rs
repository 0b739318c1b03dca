//! Investigator key wrapping with RSA-OAEP (SHA-256, MGF1-SHA-256).
//!
//! Public keys travel as SPKI PEM text (`-----BEGIN PUBLIC KEY-----`), the
//! encoding WebCrypto imports as `spki`. Private keys are PKCS#8.
//!
//! Parsing and unwrapping fail with different errors on purpose: a key that
//! does not parse is a configuration bug ([`CryptoError::MalformedKeyEncoding`]),
//! while a key that parses but does not match is a credential failure
//! ([`CryptoError::Unwrap`]).

use std::fmt;

use rand::rngs::OsRng;
use rsa::{
    Oaep, RsaPrivateKey, RsaPublicKey,
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding},
};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Default modulus size for generated investigator keys.
pub const DEFAULT_RSA_BITS: usize = 2048;

/// Smallest modulus accepted for generation.
const MIN_RSA_BITS: usize = 2048;

/// An investigator's RSA public key.
#[derive(Clone, PartialEq, Eq)]
pub struct InvestigatorPublicKey(RsaPublicKey);

impl InvestigatorPublicKey {
    /// Parse an SPKI PEM public key.
    ///
    /// # Errors
    ///
    /// - `MalformedKeyEncoding` for anything that is not a valid SPKI RSA key
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        RsaPublicKey::from_public_key_pem(pem.trim())
            .map(Self)
            .map_err(|e| CryptoError::MalformedKeyEncoding(e.to_string()))
    }

    /// Encode as SPKI PEM with LF line endings.
    pub fn to_pem(&self) -> Result<String, CryptoError> {
        self.0
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::MalformedKeyEncoding(e.to_string()))
    }
}

impl fmt::Debug for InvestigatorPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InvestigatorPublicKey(..)")
    }
}

/// An investigator's RSA private key. `Debug` output is redacted.
#[derive(Clone)]
pub struct InvestigatorPrivateKey(RsaPrivateKey);

impl InvestigatorPrivateKey {
    /// Parse a PKCS#8 PEM private key.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, CryptoError> {
        RsaPrivateKey::from_pkcs8_pem(pem.trim())
            .map(Self)
            .map_err(|e| CryptoError::MalformedKeyEncoding(e.to_string()))
    }

    /// Parse a PKCS#8 DER private key.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, CryptoError> {
        RsaPrivateKey::from_pkcs8_der(der)
            .map(Self)
            .map_err(|e| CryptoError::MalformedKeyEncoding(e.to_string()))
    }

    /// Encode as PKCS#8 DER. The buffer is zeroized on drop.
    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        self.0
            .to_pkcs8_der()
            .map(|doc| Zeroizing::new(doc.as_bytes().to_vec()))
            .map_err(|e| CryptoError::MalformedKeyEncoding(e.to_string()))
    }

    /// Encode as PKCS#8 PEM. The string is zeroized on drop.
    pub fn to_pkcs8_pem(&self) -> Result<Zeroizing<String>, CryptoError> {
        self.0
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CryptoError::MalformedKeyEncoding(e.to_string()))
    }

    /// The matching public key.
    pub fn public_key(&self) -> InvestigatorPublicKey {
        InvestigatorPublicKey(self.0.to_public_key())
    }
}

impl fmt::Debug for InvestigatorPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InvestigatorPrivateKey(..)")
    }
}

/// A freshly generated investigator key pair.
pub struct InvestigatorKeyPair {
    /// Private half; seal it before persisting
    pub private_key: InvestigatorPrivateKey,
    /// Public half; distributed to submitters
    pub public_key: InvestigatorPublicKey,
}

impl InvestigatorKeyPair {
    /// Generate a key pair with an `bits`-bit modulus.
    ///
    /// # Errors
    ///
    /// - `KeyGeneration` if `bits` is below 2048 or generation fails
    pub fn generate(bits: usize) -> Result<Self, CryptoError> {
        if bits < MIN_RSA_BITS {
            return Err(CryptoError::KeyGeneration(format!(
                "modulus must be at least {MIN_RSA_BITS} bits, got {bits}"
            )));
        }

        let private = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let public_key = InvestigatorPublicKey(private.to_public_key());

        Ok(Self { private_key: InvestigatorPrivateKey(private), public_key })
    }
}

/// Encrypt `bytes` under an investigator public key with RSA-OAEP(SHA-256).
pub fn asymmetric_wrap(
    bytes: &[u8],
    public_key: &InvestigatorPublicKey,
) -> Result<Vec<u8>, CryptoError> {
    public_key
        .0
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), bytes)
        .map_err(|e| CryptoError::Primitive(e.to_string()))
}

/// Decrypt RSA-OAEP(SHA-256) ciphertext with an investigator private key.
///
/// # Errors
///
/// - `Unwrap` for a wrong key or tampered ciphertext
pub fn asymmetric_unwrap(
    wrapped: &[u8],
    private_key: &InvestigatorPrivateKey,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    private_key
        .0
        .decrypt(Oaep::new::<Sha256>(), wrapped)
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::Unwrap)
}
