//! Account services: login and registration on top of a [`CredentialStore`].
//!
//! Every read-modify-write cycle of the store runs under `writer`, so two
//! requests in this process never overwrite each other's changes.

use crate::store::{CredentialStore, StoreError, UserRecord};
use secrecy::SecretString;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

mod login;
pub mod password;
mod register;

pub use self::password::{Hasher, PasswordError};

pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Password(#[from] PasswordError),
}

#[derive(Debug, Error)]
pub enum RegistrationFailure {
    #[error("All fields are required")]
    MissingField(&'static str),
    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },
    #[error("Username already exists")]
    DuplicateUsername,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Password(#[from] PasswordError),
}

impl RegistrationFailure {
    /// Failures caused by the submitted form rather than the service.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::MissingField(_) | Self::WeakPassword { .. } | Self::DuplicateUsername
        )
    }
}

/// Registration form contents.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: SecretString,
    pub email: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    /// Minimum length in characters, `0` disables the check.
    pub min_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_PASSWORD_LENGTH,
        }
    }
}

pub struct Accounts {
    store: Arc<dyn CredentialStore>,
    hasher: Hasher,
    policy: PasswordPolicy,
    writer: Mutex<()>,
}

impl std::fmt::Debug for Accounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accounts")
            .field("store", &self.store.describe())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Accounts {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, hasher: Hasher, policy: PasswordPolicy) -> Self {
        Self {
            store,
            hasher,
            policy,
            writer: Mutex::new(()),
        }
    }

    #[must_use]
    pub const fn policy(&self) -> PasswordPolicy {
        self.policy
    }

    /// Where the records live, for logs and health output.
    #[must_use]
    pub fn describe(&self) -> String {
        self.store.describe()
    }

    /// Look up a single record.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub async fn find(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let mut users = self.store.load().await?;
        Ok(users.remove(username))
    }

    /// Check the store is readable, returning the number of records.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub async fn ping(&self) -> Result<usize, StoreError> {
        self.store.load().await.map(|users| users.len())
    }
}
