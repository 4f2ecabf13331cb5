use super::{CredentialStore, StoreError, Users};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Volatile store, used by tests and `--memory-store`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<Users>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_users(users: Users) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn load(&self) -> Result<Users, StoreError> {
        Ok(self.users.read().await.clone())
    }

    async fn save(&self, users: &Users) -> Result<(), StoreError> {
        *self.users.write().await = users.clone();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
