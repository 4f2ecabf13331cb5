use super::{CredentialStore, StoreError, Users};
use async_trait::async_trait;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, instrument, warn};
use ulid::Ulid;

/// JSON document on disk, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    // Sibling of the target so the final rename never crosses filesystems.
    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "users".into(), |name| name.to_string_lossy().into_owned());
        self.path.with_file_name(format!(".{name}.{}.tmp", Ulid::new()))
    }

    async fn write_temp(&self, temp: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(temp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await
    }
}

async fn remove_temp(temp: &Path) {
    if let Err(err) = fs::remove_file(temp).await {
        if err.kind() != ErrorKind::NotFound {
            warn!("failed to remove {}: {err}", temp.display());
        }
    }
}

#[async_trait]
impl CredentialStore for JsonFileStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Users, StoreError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("credential document missing, starting empty");
                return Ok(Users::new());
            }
            Err(err) => return Err(self.io_error(err)),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Users::new());
        }

        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    #[instrument(skip(self, users), fields(path = %self.path.display(), users = users.len()))]
    async fn save(&self, users: &Users) -> Result<(), StoreError> {
        let mut bytes = serde_json::to_vec_pretty(users)?;
        bytes.push(b'\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| self.io_error(err))?;
        }

        let temp = self.temp_path();
        if let Err(err) = self.write_temp(&temp, &bytes).await {
            remove_temp(&temp).await;
            return Err(self.io_error(err));
        }

        if let Err(err) = fs::rename(&temp, &self.path).await {
            remove_temp(&temp).await;
            return Err(self.io_error(err));
        }

        debug!("credential document saved");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
