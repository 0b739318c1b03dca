//! Service configuration.
//!
//! Persisted as JSON next to the case database. Holds only public material
//! and a salted password hash; the investigator's private key lives in a
//! separate password-sealed file that the service never reads.

use std::path::Path;

use serde::{Deserialize, Serialize};
use vaultvoice_crypto::{
    InvestigatorPublicKey, SymmetricKey, derive_key_from_password, encoding::base64_array,
    generate_salt,
};

use crate::error::ServiceError;

/// Default lifetime of an investigator auth token (8 hours).
pub const DEFAULT_TOKEN_TTL_MILLIS: u64 = 8 * 60 * 60 * 1000;

/// Login credentials for the reference authenticator.
///
/// The password is stored as a PBKDF2 hash under its own random salt.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigatorCredentials {
    /// Login name
    pub username: String,
    #[serde(rename = "saltBase64", with = "base64_array")]
    salt: [u8; 16],
    #[serde(rename = "passwordHashBase64", with = "base64_array")]
    password_hash: [u8; 32],
}

impl InvestigatorCredentials {
    /// Hash `password` under a fresh salt.
    ///
    /// # Errors
    ///
    /// - `Crypto` if the OS RNG fails
    pub fn new(username: &str, password: &str) -> Result<Self, ServiceError> {
        let salt = generate_salt()?;
        let derived = derive_key_from_password(password, &salt)?;

        Ok(Self { username: username.to_owned(), salt, password_hash: *derived.as_bytes() })
    }

    /// Whether `username` and `password` match. The hash comparison is
    /// constant-time.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let Ok(derived) = derive_key_from_password(password, &self.salt) else {
            return false;
        };
        let hash_matches = derived.ct_eq(&SymmetricKey::from_bytes(self.password_hash));

        hash_matches && username == self.username
    }
}

impl std::fmt::Debug for InvestigatorCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvestigatorCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Case service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Investigator public key (SPKI PEM) handed to every new case
    pub investigator_public_key: String,
    /// Credentials accepted by the reference authenticator
    pub credentials: InvestigatorCredentials,
    /// Auth token lifetime in milliseconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_millis: u64,
}

fn default_token_ttl() -> u64 {
    DEFAULT_TOKEN_TTL_MILLIS
}

impl ServiceConfig {
    /// Config with the default token lifetime.
    pub fn new(investigator_public_key: String, credentials: InvestigatorCredentials) -> Self {
        Self { investigator_public_key, credentials, token_ttl_millis: DEFAULT_TOKEN_TTL_MILLIS }
    }

    /// Check that the public key parses and the token lifetime is non-zero.
    ///
    /// # Errors
    ///
    /// - `Config` describing the first problem found
    pub fn validate(&self) -> Result<(), ServiceError> {
        InvestigatorPublicKey::from_pem(&self.investigator_public_key)
            .map_err(|e| ServiceError::Config(format!("investigator public key: {e}")))?;

        if self.token_ttl_millis == 0 {
            return Err(ServiceError::Config("token lifetime must be non-zero".to_string()));
        }

        Ok(())
    }

    /// Read and validate a config file.
    ///
    /// # Errors
    ///
    /// - `Io` if the file cannot be read
    /// - `Config` if it is not valid JSON or fails [`Self::validate`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Io(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| ServiceError::Config(format!("{}: {e}", path.display())))?;

        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// - `Io` if the file cannot be written
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ServiceError> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| ServiceError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const PUBLIC_PEM: &str =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../testdata/investigator_public.pem"));

    #[test]
    fn credentials_verify_only_the_right_pair() {
        let credentials = InvestigatorCredentials::new("inv", "s3cret").unwrap();

        assert!(credentials.verify("inv", "s3cret"));
        assert!(!credentials.verify("inv", "wrong"));
        assert!(!credentials.verify("other", "s3cret"));
    }

    #[test]
    fn debug_hides_the_hash() {
        let credentials = InvestigatorCredentials::new("inv", "s3cret").unwrap();
        let rendered = format!("{credentials:?}");

        assert!(rendered.contains("inv"));
        assert!(!rendered.contains("Hash"));
    }

    #[test]
    fn malformed_public_key_is_a_config_error() {
        let credentials = InvestigatorCredentials::new("inv", "pw").unwrap();
        let config = ServiceConfig::new("not a key".to_string(), credentials);

        assert!(matches!(config.validate(), Err(ServiceError::Config(_))));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("service.json");
        let credentials = InvestigatorCredentials::new("inv", "pw").unwrap();
        let config = ServiceConfig::new(PUBLIC_PEM.to_string(), credentials);

        config.save(&path).unwrap();
        let loaded = ServiceConfig::load(&path).unwrap();

        assert_eq!(loaded, config);
        assert!(loaded.credentials.verify("inv", "pw"));
    }

    #[test]
    fn missing_ttl_defaults() {
        let credentials = InvestigatorCredentials::new("inv", "pw").unwrap();
        let mut json =
            serde_json::to_value(ServiceConfig::new(PUBLIC_PEM.to_string(), credentials)).unwrap();
        json.as_object_mut().unwrap().remove("tokenTtlMillis");

        let config: ServiceConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.token_ttl_millis, DEFAULT_TOKEN_TTL_MILLIS);
    }
}
