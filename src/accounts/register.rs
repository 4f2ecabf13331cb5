use super::{Accounts, NewUser, RegistrationFailure};
use crate::store::UserRecord;
use chrono::Utc;
use secrecy::ExposeSecret;
use tracing::{debug, info, instrument};

impl Accounts {
    /// Validate and insert a new account.
    ///
    /// # Errors
    /// `MissingField`, `WeakPassword` or `DuplicateUsername` for invalid input,
    /// store and hashing faults otherwise.
    #[instrument(skip(self, new_user), fields(username = %new_user.username.trim()))]
    pub async fn register(&self, new_user: NewUser) -> Result<UserRecord, RegistrationFailure> {
        let new_user = normalize(new_user)?;

        let min = self.policy.min_length;
        if min > 0 && new_user.password.expose_secret().chars().count() < min {
            debug!("password below minimum length");
            return Err(RegistrationFailure::WeakPassword { min });
        }

        self.insert(new_user).await
    }

    /// Insert the account unless the username is taken. Skips the password
    /// length policy. Returns `true` when a record was created.
    ///
    /// # Errors
    /// `MissingField` for blank input, store and hashing faults otherwise.
    pub async fn ensure_user(&self, new_user: NewUser) -> Result<bool, RegistrationFailure> {
        let new_user = normalize(new_user)?;
        match self.insert(new_user).await {
            Ok(_) => Ok(true),
            Err(RegistrationFailure::DuplicateUsername) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn insert(&self, new_user: NewUser) -> Result<UserRecord, RegistrationFailure> {
        // Cheap rejection before paying for a hash; re-checked under the lock.
        if self.find(&new_user.username).await?.is_some() {
            return Err(RegistrationFailure::DuplicateUsername);
        }

        let password_hash = self.hasher.hash(&new_user.password).await?;

        let _guard = self.writer.lock().await;
        let mut users = self.store.load().await?;
        if users.contains_key(&new_user.username) {
            return Err(RegistrationFailure::DuplicateUsername);
        }

        let record = UserRecord {
            username: new_user.username,
            password_hash,
            email: new_user.email,
            full_name: new_user.full_name,
            created_at: Utc::now(),
            last_login: None,
        };
        users.insert(record.username.clone(), record.clone());
        self.store.save(&users).await?;

        info!("user registered");
        Ok(record)
    }
}

fn normalize(new_user: NewUser) -> Result<NewUser, RegistrationFailure> {
    let username = new_user.username.trim().to_string();
    let email = new_user.email.trim().to_string();
    let full_name = new_user.full_name.trim().to_string();

    let missing = [
        ("username", username.is_empty()),
        ("password", new_user.password.expose_secret().is_empty()),
        ("email", email.is_empty()),
        ("full_name", full_name.is_empty()),
    ]
    .into_iter()
    .find_map(|(field, empty)| empty.then_some(field));

    if let Some(field) = missing {
        debug!("missing field: {field}");
        return Err(RegistrationFailure::MissingField(field));
    }

    Ok(NewUser {
        username,
        password: new_user.password,
        email,
        full_name,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::{
        accounts::{PasswordPolicy, DEFAULT_MIN_PASSWORD_LENGTH},
        store::{CredentialStore, MemoryStore},
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn stores_one_hashed_record() {
        let (store, accounts) = accounts();
        let result = accounts
            .register(new_user("alice", "secret1", "a@x.com", "Alice"))
            .await;
        assert!(result.is_ok());

        let users = store.load().await.unwrap_or_default();
        assert_eq!(users.len(), 1);
        let alice = users.get("alice");
        assert!(alice.is_some_and(|u| {
            u.email == "a@x.com"
                && u.full_name == "Alice"
                && u.last_login.is_none()
                && u.password_hash != "secret1"
                && !u.has_legacy_password()
        }));
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let (store, accounts) = accounts();
        let first = accounts
            .register(new_user("alice", "secret1", "a@x.com", "Alice"))
            .await;
        assert!(first.is_ok());

        let second = accounts
            .register(new_user("alice", "other-pass", "b@x.com", "Other Alice"))
            .await;
        assert!(matches!(second, Err(RegistrationFailure::DuplicateUsername)));

        let users = store.load().await.unwrap_or_default();
        assert!(users.get("alice").is_some_and(|u| u.email == "a@x.com"));
    }

    #[tokio::test]
    async fn each_empty_field_is_missing() {
        let (_store, accounts) = accounts();
        let cases = [
            (new_user("", "secret1", "a@x.com", "Alice"), "username"),
            (new_user("alice", "", "a@x.com", "Alice"), "password"),
            (new_user("alice", "secret1", "  ", "Alice"), "email"),
            (new_user("alice", "secret1", "a@x.com", ""), "full_name"),
        ];
        for (user, field) in cases {
            let result = accounts.register(user).await;
            assert!(
                matches!(result, Err(RegistrationFailure::MissingField(f)) if f == field),
                "expected missing {field}"
            );
        }
    }

    #[tokio::test]
    async fn short_password_is_weak() {
        let (_store, accounts) = accounts();
        let result = accounts
            .register(new_user("newuser", "123", "new@example.com", "New"))
            .await;
        assert!(matches!(
            result,
            Err(RegistrationFailure::WeakPassword { min }) if min == DEFAULT_MIN_PASSWORD_LENGTH
        ));
    }

    #[tokio::test]
    async fn zero_minimum_disables_length_check() {
        let store = Arc::new(MemoryStore::new());
        let accounts = Accounts::new(store, hasher(), PasswordPolicy { min_length: 0 });
        let result = accounts
            .register(new_user("tiny", "1", "t@x.com", "Tiny"))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn fields_are_trimmed() {
        let (store, accounts) = accounts();
        let _ = accounts
            .register(new_user("  bob ", "secret1", " b@x.com ", " Bob B "))
            .await;
        let users = store.load().await.unwrap_or_default();
        assert!(users
            .get("bob")
            .is_some_and(|u| u.email == "b@x.com" && u.full_name == "Bob B"));
    }

    #[tokio::test]
    async fn ensure_user_is_idempotent_and_ignores_policy() {
        let store = Arc::new(MemoryStore::new());
        let accounts = Accounts::new(store.clone(), hasher(), PasswordPolicy { min_length: 32 });

        let created = accounts
            .ensure_user(new_user("testuser", "pass123", "test@example.com", "Test User"))
            .await;
        assert!(matches!(created, Ok(true)));

        let again = accounts
            .ensure_user(new_user("testuser", "different", "x@example.com", "X"))
            .await;
        assert!(matches!(again, Ok(false)));

        let users = store.load().await.unwrap_or_default();
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_registrations_keep_every_user() {
        let (store, accounts) = accounts();
        let accounts = Arc::new(accounts);

        let mut handles = Vec::new();
        for i in 0..8 {
            let accounts = accounts.clone();
            handles.push(tokio::spawn(async move {
                accounts
                    .register(new_user(
                        &format!("user{i}"),
                        "secret1",
                        &format!("user{i}@x.com"),
                        "User",
                    ))
                    .await
                    .is_ok()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap_or(false));
        }

        let users = store.load().await.unwrap_or_default();
        assert_eq!(users.len(), 8);
    }
}
