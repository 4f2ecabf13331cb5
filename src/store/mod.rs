//! Credential store: the persistence boundary for user records.
//!
//! The whole mapping is read and written wholesale. Callers that need a
//! read-modify-write cycle go through [`crate::accounts::Accounts`], which
//! serializes writers.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

mod file;
mod memory;
mod record;

pub use self::file::JsonFileStore;
pub use self::memory::MemoryStore;
pub use self::record::UserRecord;

/// Username to record, ordered so the persisted document is deterministic.
pub type Users = BTreeMap<String, UserRecord>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("credential document {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize credential document: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read every record. Returns an empty map when nothing was persisted yet.
    async fn load(&self) -> Result<Users, StoreError>;

    /// Replace the persisted state with `users`.
    async fn save(&self, users: &Users) -> Result<(), StoreError>;

    /// Short human readable description used in logs.
    fn describe(&self) -> String;
}
