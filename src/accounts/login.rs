use super::{password::legacy_matches, Accounts, AuthFailure};
use crate::store::UserRecord;
use chrono::Utc;
use secrecy::SecretString;
use tracing::{debug, info, instrument, warn};

impl Accounts {
    /// Verify a username/password pair and stamp `last_login`.
    ///
    /// Records that still hold a plaintext password are upgraded to an
    /// Argon2id hash on their first successful login.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown user or a wrong password, store and
    /// hashing faults otherwise.
    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<UserRecord, AuthFailure> {
        let Some(record) = self.find(username).await? else {
            self.hasher.verify_dummy(password).await?;
            debug!("unknown user");
            return Err(AuthFailure::InvalidCredentials);
        };

        let legacy = record.has_legacy_password();
        let matched = if legacy {
            legacy_matches(password, &record.password_hash)
        } else {
            self.hasher.verify(password, &record.password_hash).await?
        };

        if !matched {
            debug!("password mismatch");
            return Err(AuthFailure::InvalidCredentials);
        }

        let upgraded = if legacy {
            Some(self.hasher.hash(password).await?)
        } else {
            None
        };

        let _guard = self.writer.lock().await;
        let mut users = self.store.load().await?;
        let Some(stored) = users.get_mut(username) else {
            warn!("user disappeared during login");
            return Err(AuthFailure::InvalidCredentials);
        };

        if let Some(hash) = upgraded {
            // Only replace the secret we actually verified.
            if stored.password_hash == record.password_hash {
                info!("upgraded legacy plaintext password");
                stored.password_hash = hash;
            }
        }
        stored.last_login = Some(Utc::now());
        let updated = stored.clone();

        self.store.save(&users).await?;

        info!("login succeeded");
        Ok(updated)
    }
}
