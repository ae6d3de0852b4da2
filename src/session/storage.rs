//! Durable storage for the bearer token.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where the session credential survives process restarts.
pub trait CredentialStorage: Send + Sync {
    /// Read the persisted token, `None` when nothing is stored.
    fn load(&self) -> Result<Option<String>>;

    /// Persist the token, replacing any previous one.
    fn store(&self, token: &str) -> Result<()>;

    /// Forget the persisted token.
    fn clear(&self) -> Result<()>;
}

/// Keeps the token in a single file on disk.
#[derive(Debug, Clone)]
pub struct FileCredentialStorage {
    path: PathBuf,
}

impl FileCredentialStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStorage for FileCredentialStorage {
    fn load(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let token = content.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn store(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local storage. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStorage {
    token: Arc<Mutex<Option<String>>>,
}

impl MemoryCredentialStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that already holds a token, as if persisted by an earlier run.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(Mutex::new(Some(token.into()))),
        }
    }

    pub fn stored(&self) -> Option<String> {
        self.token.lock().clone()
    }
}

impl CredentialStorage for MemoryCredentialStorage {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.stored())
    }

    fn store(&self, token: &str) -> Result<()> {
        *self.token.lock() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.token.lock() = None;
        Ok(())
    }
}
