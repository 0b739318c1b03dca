//! Base64 conversions and serde adapters for the JSON wire forms.
//!
//! All wire fields use standard (padded) base64, matching what browsers
//! produce with `btoa`.

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::error::CryptoError;

/// Encode bytes as standard base64.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD.decode(text.trim()).map_err(|e| CryptoError::Encoding(e.to_string()))
}

/// Decode standard base64 into a fixed-size array.
pub fn decode_base64_array<const N: usize>(text: &str) -> Result<[u8; N], CryptoError> {
    let bytes = decode_base64(text)?;
    bytes.as_slice().try_into().map_err(|_| {
        CryptoError::Encoding(format!("expected {N} decoded bytes, got {}", bytes.len()))
    })
}

/// `#[serde(with = "...")]` adapter for `Vec<u8>` fields stored as base64.
pub mod base64_bytes {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    /// Serialize bytes as a base64 string.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_base64(bytes))
    }

    /// Deserialize bytes from a base64 string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::decode_base64(&text).map_err(D::Error::custom)
    }
}

/// `#[serde(with = "...")]` adapter for fixed-size byte arrays stored as
/// base64.
pub mod base64_array {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    /// Serialize a byte array as a base64 string.
    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_base64(bytes))
    }

    /// Deserialize a byte array from a base64 string, rejecting wrong sizes.
    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let text = String::deserialize(deserializer)?;
        super::decode_base64_array::<N>(&text).map_err(D::Error::custom)
    }
}
