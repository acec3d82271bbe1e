//! Persistence backends for the session.
//!
//! The three persisted keys (`jwt`, `refreshToken`, `role`) are always
//! written and erased as one record.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("session file io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session file is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

/// Persisted credentials, keyed the way the browser's per-tab storage holds them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt: Option<String>,
    #[serde(rename = "refreshToken", default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Storage area the [`super::SessionStore`] hydrates from and writes through to.
pub trait SessionStorage: Send + Sync {
    /// Read the persisted record. A missing record is an empty one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read or decoded.
    fn load(&self) -> Result<PersistedSession, StorageError>;

    /// Replace the persisted record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn save(&self, session: &PersistedSession) -> Result<(), StorageError>;

    /// Remove all persisted keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn erase(&self) -> Result<(), StorageError>;
}

// =============================================================================
// MEMORY
// =============================================================================

/// Process-lifetime storage, the analogue of a browser tab's session storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    record: Mutex<PersistedSession>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session(session: PersistedSession) -> Self {
        Self { record: Mutex::new(session) }
    }

    #[must_use]
    pub fn snapshot(&self) -> PersistedSession {
        self.record
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<PersistedSession, StorageError> {
        Ok(self.snapshot())
    }

    fn save(&self, session: &PersistedSession) -> Result<(), StorageError> {
        *self
            .record
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = session.clone();
        Ok(())
    }

    fn erase(&self) -> Result<(), StorageError> {
        self.save(&PersistedSession::default())
    }
}

// =============================================================================
// FILE
// =============================================================================

/// JSON file storage used by the CLI so a session survives between invocations.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> Result<PersistedSession, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(PersistedSession::default()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistedSession::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, session: &PersistedSession) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, body)?;
        Ok(())
    }

    fn erase(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
