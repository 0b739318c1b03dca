//! Password-based key derivation (PBKDF2-HMAC-SHA256).
//!
//! Parameters match the browser client so envelopes created there open here:
//! 150 000 iterations, SHA-256, 16-byte salt, 256-bit output.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::{
    error::CryptoError,
    key::{KEY_SIZE, SymmetricKey},
};

/// Salt size in bytes.
pub const SALT_SIZE: usize = 16;

/// PBKDF2 iteration count for passphrase and key-password derivation.
pub const PBKDF2_ITERATIONS: u32 = 150_000;

/// Generate a random salt from the OS CSPRNG.
pub fn generate_salt() -> Result<[u8; SALT_SIZE], CryptoError> {
    let mut salt = [0u8; SALT_SIZE];
    getrandom::fill(&mut salt).map_err(|e| CryptoError::Rng(e.to_string()))?;
    Ok(salt)
}

/// Derive a 256-bit key from a password and salt.
///
/// Deterministic: the same `(password, salt)` always yields the same key.
///
/// # Errors
///
/// - `InvalidSaltLength` if `salt` is not exactly [`SALT_SIZE`] bytes
pub fn derive_key_from_password(password: &str, salt: &[u8]) -> Result<SymmetricKey, CryptoError> {
    derive_key_with_iterations(password, salt, PBKDF2_ITERATIONS)
}

/// Derive a key with a custom iteration count.
///
/// Only [`PBKDF2_ITERATIONS`] is used for stored envelopes; other counts exist
/// for interop vectors and cheap property tests.
pub fn derive_key_with_iterations(
    password: &str,
    salt: &[u8],
    iterations: u32,
) -> Result<SymmetricKey, CryptoError> {
    if salt.len() != SALT_SIZE {
        return Err(CryptoError::InvalidSaltLength { expected: SALT_SIZE, got: salt.len() });
    }
    if iterations == 0 {
        return Err(CryptoError::Primitive("PBKDF2 iteration count must be non-zero".into()));
    }

    let mut okm = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut okm);
    let key = SymmetricKey::from_bytes(okm);
    okm.zeroize();
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_salt_length() {
        for len in [0usize, 8, 15, 17, 32] {
            let salt = vec![0u8; len];
            assert_eq!(
                derive_key_with_iterations("pw", &salt, 1).unwrap_err(),
                CryptoError::InvalidSaltLength { expected: SALT_SIZE, got: len }
            );
        }
    }

    #[test]
    fn rejects_zero_iterations() {
        assert!(derive_key_with_iterations("pw", &[0u8; SALT_SIZE], 0).is_err());
    }

    #[test]
    fn default_derivation_is_deterministic() {
        let salt = [9u8; SALT_SIZE];
        let a = derive_key_from_password("correct-horse", &salt).unwrap();
        let b = derive_key_from_password("correct-horse", &salt).unwrap();
        assert!(a.ct_eq(&b));
    }

    #[test]
    fn salts_are_random() {
        assert_ne!(generate_salt().unwrap(), generate_salt().unwrap());
    }

    // Output must be plain PBKDF2 so browser-created envelopes open here.
    #[test]
    fn matches_raw_pbkdf2() {
        let salt = *b"0123456789abcdef";
        let key = derive_key_with_iterations("passwd", &salt, 2).unwrap();

        let mut expected = [0u8; KEY_SIZE];
        pbkdf2_hmac::<Sha256>(b"passwd", &salt, 2, &mut expected);
        assert_eq!(key.as_bytes(), &expected);
    }
}
