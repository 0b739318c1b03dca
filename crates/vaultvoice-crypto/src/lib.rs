//! VaultVoice Cryptographic Primitives
//!
//! Stateless building blocks for the case-key envelope protocol: AEAD
//! encryption, password-based key derivation, RSA-OAEP key wrapping and the
//! base64 wire encodings. Nothing here logs, persists or caches key material.
//!
//! # Key Hierarchy
//!
//! ```text
//!                    Case Key (random, 256-bit)
//!                    │                 │
//!   PBKDF2(passphrase, salt)      RSA-OAEP(investigator public key)
//!                    │                 │
//!                    ▼                 ▼
//!       Passphrase envelope     Investigator envelope
//!       (submitter device)      (server case record)
//!
//!   Case Key ──AEAD──► every thread item (fresh nonce per item)
//! ```
//!
//! # Security
//!
//! Confidentiality and integrity:
//! - AES-256-GCM (default) or ChaCha20-Poly1305, 96-bit random nonces
//! - Any tag mismatch is [`CryptoError::Authentication`]; no partial plaintext
//!
//! Key hygiene:
//! - [`SymmetricKey`] is not `Clone`, zeroizes on drop and redacts `Debug`
//! - Unwrapped key bytes are returned in `Zeroizing` buffers
//!
//! Error hygiene:
//! - Malformed key text and wrong-key failures are distinct errors
//! - Wrong-key and tampered-data failures are indistinguishable

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aead;
pub mod asymmetric;
pub mod encoding;
mod error;
pub mod kdf;
mod key;

pub use aead::{
    Algorithm, EncryptedBlob, NONCE_SIZE, TAG_SIZE, aead_decrypt, aead_encrypt, aead_encrypt_with,
};
pub use asymmetric::{
    DEFAULT_RSA_BITS, InvestigatorKeyPair, InvestigatorPrivateKey, InvestigatorPublicKey,
    asymmetric_unwrap, asymmetric_wrap,
};
pub use encoding::{decode_base64, encode_base64};
pub use error::CryptoError;
pub use kdf::{PBKDF2_ITERATIONS, SALT_SIZE, derive_key_from_password, generate_salt};
pub use key::{KEY_SIZE, SymmetricKey, generate_symmetric_key};
pub use zeroize::Zeroizing;
