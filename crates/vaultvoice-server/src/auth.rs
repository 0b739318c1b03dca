//! Investigator authentication.
//!
//! The service only needs two answers from an authenticator: "do these
//! credentials earn a token?" and "is this token still good?". Real
//! deployments plug in their identity provider behind
//! [`InvestigatorAuthenticator`]; [`CredentialAuthenticator`] is the
//! single-account reference implementation.

#![allow(clippy::disallowed_types, reason = "Synchronous token table only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use vaultvoice_core::{
    ApiError, Environment,
    api::{AuthToken, LoginRequest},
};

use crate::config::InvestigatorCredentials;

/// Token issuance and verification for investigators.
pub trait InvestigatorAuthenticator: Send + Sync + 'static {
    /// Exchange credentials for a token.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` for rejected credentials
    fn login(&self, request: &LoginRequest) -> Result<AuthToken, ApiError>;

    /// Check a presented token.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` for unknown or expired tokens
    fn verify(&self, token: &AuthToken) -> Result<(), ApiError>;
}

/// One account, random bearer tokens with a fixed lifetime.
///
/// Tokens live only in memory; a restart logs every investigator out.
#[derive(Clone)]
pub struct CredentialAuthenticator<E: Environment> {
    credentials: InvestigatorCredentials,
    ttl_millis: u64,
    env: E,
    /// Token -> issue time (wall clock millis)
    tokens: Arc<Mutex<HashMap<String, u64>>>,
}

impl<E: Environment> CredentialAuthenticator<E> {
    /// Accept `credentials`, issuing tokens valid for `ttl_millis`.
    pub fn new(credentials: InvestigatorCredentials, ttl_millis: u64, env: E) -> Self {
        Self { credentials, ttl_millis, env, tokens: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Number of tokens currently held, expired ones included.
    #[allow(clippy::expect_used)]
    pub fn issued_count(&self) -> usize {
        self.tokens.lock().expect("Mutex poisoned").len()
    }
}

impl<E: Environment> InvestigatorAuthenticator for CredentialAuthenticator<E> {
    #[allow(clippy::expect_used)]
    fn login(&self, request: &LoginRequest) -> Result<AuthToken, ApiError> {
        if !self.credentials.verify(&request.username, &request.password) {
            tracing::warn!("investigator login rejected");
            return Err(ApiError::Unauthorized);
        }

        let mut bytes = [0u8; 32];
        self.env.random_bytes(&mut bytes);
        let token = hex::encode(bytes);
        let now = self.env.wall_clock_millis();

        let mut tokens = self.tokens.lock().expect("Mutex poisoned");
        let ttl = self.ttl_millis;
        tokens.retain(|_, issued| now.saturating_sub(*issued) <= ttl);
        tokens.insert(token.clone(), now);

        Ok(AuthToken(token))
    }

    #[allow(clippy::expect_used)]
    fn verify(&self, token: &AuthToken) -> Result<(), ApiError> {
        let now = self.env.wall_clock_millis();
        let tokens = self.tokens.lock().expect("Mutex poisoned");

        match tokens.get(&token.0) {
            Some(issued) if now.saturating_sub(*issued) <= self.ttl_millis => Ok(()),
            _ => Err(ApiError::Unauthorized),
        }
    }
}

#[cfg(test)]
mod tests {
    use vaultvoice_core::env::test_utils::MockEnv;

    use super::*;

    fn authenticator(env: &MockEnv) -> CredentialAuthenticator<MockEnv> {
        let credentials = InvestigatorCredentials::new("inv", "s3cret").unwrap();
        CredentialAuthenticator::new(credentials, 1_000, env.clone())
    }

    fn request(password: &str) -> LoginRequest {
        LoginRequest { username: "inv".to_string(), password: password.to_string() }
    }

    #[test]
    fn valid_login_issues_verifiable_token() {
        let env = MockEnv::seeded(1);
        let auth = authenticator(&env);

        let token = auth.login(&request("s3cret")).unwrap();

        assert_eq!(token.0.len(), 64);
        assert_eq!(auth.verify(&token), Ok(()));
    }

    #[test]
    fn wrong_password_is_unauthorized() {
        let env = MockEnv::seeded(2);
        let auth = authenticator(&env);

        assert_eq!(auth.login(&request("nope")), Err(ApiError::Unauthorized));
        assert_eq!(auth.issued_count(), 0);
    }

    #[test]
    fn unknown_token_is_unauthorized() {
        let env = MockEnv::seeded(3);
        let auth = authenticator(&env);

        assert_eq!(auth.verify(&AuthToken("forged".into())), Err(ApiError::Unauthorized));
    }

    #[test]
    fn token_expires_after_ttl() {
        let env = MockEnv::seeded(4);
        let auth = authenticator(&env);
        let token = auth.login(&request("s3cret")).unwrap();

        env.advance(1_000);
        assert_eq!(auth.verify(&token), Ok(()));

        env.advance(1);
        assert_eq!(auth.verify(&token), Err(ApiError::Unauthorized));
    }

    #[test]
    fn expired_tokens_are_pruned_on_login() {
        let env = MockEnv::seeded(5);
        let auth = authenticator(&env);
        auth.login(&request("s3cret")).unwrap();

        env.advance(5_000);
        auth.login(&request("s3cret")).unwrap();

        assert_eq!(auth.issued_count(), 1);
    }
}
