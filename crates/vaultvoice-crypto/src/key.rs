//! Symmetric key material.

use std::fmt;

use zeroize::Zeroize;

use crate::error::CryptoError;

/// Size of every symmetric key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// A 256-bit symmetric key usable with every supported AEAD.
///
/// Not `Clone`: a key has exactly one owner and is zeroized when that owner
/// drops it. `Debug` output is redacted.
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Wrap raw key bytes from a slice, checking the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength { expected: KEY_SIZE, got: bytes.len() })?;
        Ok(Self { bytes })
    }

    /// Raw key bytes.
    ///
    /// Only for feeding ciphers and key wrapping. Never persist these.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Constant-time comparison of two keys.
    pub fn ct_eq(&self, other: &Self) -> bool {
        self.bytes.iter().zip(other.bytes.iter()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Generate a fresh random 256-bit key from the OS CSPRNG.
pub fn generate_symmetric_key() -> Result<SymmetricKey, CryptoError> {
    let mut bytes = [0u8; KEY_SIZE];
    getrandom::fill(&mut bytes).map_err(|e| CryptoError::Rng(e.to_string()))?;
    let key = SymmetricKey::from_bytes(bytes);
    bytes.zeroize();
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_differ() {
        let a = generate_symmetric_key().unwrap();
        let b = generate_symmetric_key().unwrap();
        assert!(!a.ct_eq(&b));
    }

    #[test]
    fn from_slice_checks_length() {
        assert!(SymmetricKey::from_slice(&[0u8; 32]).is_ok());
        assert_eq!(
            SymmetricKey::from_slice(&[0u8; 16]).unwrap_err(),
            CryptoError::InvalidKeyLength { expected: 32, got: 16 }
        );
    }

    #[test]
    fn debug_is_redacted() {
        let key = SymmetricKey::from_bytes([0x41; KEY_SIZE]);
        assert_eq!(format!("{key:?}"), "SymmetricKey(..)");
    }

    #[test]
    fn ct_eq_matches_byte_equality() {
        let a = SymmetricKey::from_bytes([7; KEY_SIZE]);
        let b = SymmetricKey::from_bytes([7; KEY_SIZE]);
        let mut other = [7; KEY_SIZE];
        other[31] = 8;
        let c = SymmetricKey::from_bytes(other);
        assert!(a.ct_eq(&b));
        assert!(!a.ct_eq(&c));
    }
}
