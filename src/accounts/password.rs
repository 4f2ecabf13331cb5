//! Argon2id hashing and constant-time verification.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tokio::task;

const DUMMY_PASSWORD: &str = "keyhole-timing-equalizer";

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("invalid argon2 parameters: {0}")]
    Params(argon2::Error),
    #[error("password hashing failed: {0}")]
    Hash(argon2::password_hash::Error),
    #[error("hashing task failed: {0}")]
    Join(#[from] task::JoinError),
}

/// Argon2id hasher shared by login and registration.
#[derive(Clone)]
pub struct Hasher {
    argon2: Argon2<'static>,
    // Verified when the user does not exist so both paths cost the same.
    dummy_hash: Arc<str>,
}

impl std::fmt::Debug for Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hasher").finish_non_exhaustive()
    }
}

impl Hasher {
    /// # Errors
    /// Returns an error if the dummy hash cannot be computed.
    pub fn new(params: Params) -> Result<Self, PasswordError> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = hash_with(&argon2, DUMMY_PASSWORD)?;
        Ok(Self {
            argon2,
            dummy_hash: dummy_hash.into(),
        })
    }

    /// Build a hasher from explicit costs (memory in KiB, iterations, lanes).
    ///
    /// # Errors
    /// Returns an error if the parameters are out of range.
    pub fn with_cost(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, PasswordError> {
        let params = Params::new(m_cost, t_cost, p_cost, None).map_err(PasswordError::Params)?;
        Self::new(params)
    }

    /// Hash `password` with a fresh random salt on the blocking pool.
    ///
    /// # Errors
    /// Returns an error if hashing fails or the blocking task panics.
    pub async fn hash(&self, password: &SecretString) -> Result<String, PasswordError> {
        let argon2 = self.argon2.clone();
        let password = password.clone();
        task::spawn_blocking(move || hash_with(&argon2, password.expose_secret())).await?
    }

    /// Check `password` against a stored PHC string.
    ///
    /// Malformed stored values never match.
    ///
    /// # Errors
    /// Returns an error only if the blocking task panics.
    pub async fn verify(&self, password: &SecretString, stored: &str) -> Result<bool, PasswordError> {
        let argon2 = self.argon2.clone();
        let password = password.clone();
        let stored = stored.to_string();
        let matched = task::spawn_blocking(move || {
            PasswordHash::new(&stored).is_ok_and(|parsed| {
                argon2
                    .verify_password(password.expose_secret().as_bytes(), &parsed)
                    .is_ok()
            })
        })
        .await?;
        Ok(matched)
    }

    /// Spend the same work as a real verification and discard the result.
    ///
    /// # Errors
    /// Returns an error only if the blocking task panics.
    pub async fn verify_dummy(&self, password: &SecretString) -> Result<(), PasswordError> {
        let dummy = self.dummy_hash.clone();
        self.verify(password, &dummy).await.map(|_| ())
    }
}

/// Constant-time comparison for records that still hold a plaintext secret.
#[must_use]
pub fn legacy_matches(password: &SecretString, stored: &str) -> bool {
    password
        .expose_secret()
        .as_bytes()
        .ct_eq(stored.as_bytes())
        .into()
}

fn hash_with(argon2: &Argon2<'static>, password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(PasswordError::Hash)
}
