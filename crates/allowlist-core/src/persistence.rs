//! Durable Storage Port
//!
//! The allowlist store reads and writes its state through [`PersistencePort`]
//! so callers decide where it lives.
//!
//! Implementations:
//! - [`MemoryBackend`] (tests, ephemeral sessions)
//! - [`JsonFileBackend`] (one JSON document per namespace on disk)

use crate::types::PersistedAllowlist;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "allowlist";

/// Errors from a persistence backend
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt stored allowlist: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Read/write/clear access to one persisted allowlist.
pub trait PersistencePort: Send + Sync {
    /// Load the stored state, `None` if nothing was ever written
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be read or decoded.
    fn read(&self) -> Result<Option<PersistedAllowlist>, PersistenceError>;

    /// Replace the stored state
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be written.
    fn write(&self, state: &PersistedAllowlist) -> Result<(), PersistenceError>;

    /// Remove the stored state
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be cleared.
    fn clear(&self) -> Result<(), PersistenceError>;
}

/// Shared in-memory storage.
///
/// Clones share the same map, so two stores opened on clones of one backend
/// behave like two browser tabs over the same local storage.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    namespace: String,
    slots: Arc<Mutex<HashMap<String, PersistedAllowlist>>>,
}

impl MemoryBackend {
    /// Create an empty backend under `namespace`
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// View of the same storage under another namespace
    #[must_use]
    pub fn with_namespace(&self, namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            slots: Arc::clone(&self.slots),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl PersistencePort for MemoryBackend {
    fn read(&self) -> Result<Option<PersistedAllowlist>, PersistenceError> {
        Ok(self.slots.lock().get(&self.namespace).cloned())
    }

    fn write(&self, state: &PersistedAllowlist) -> Result<(), PersistenceError> {
        self.slots
            .lock()
            .insert(self.namespace.clone(), state.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        self.slots.lock().remove(&self.namespace);
        Ok(())
    }
}

/// JSON file storage at `<dir>/<namespace>.json`.
///
/// Writes go to a temporary sibling file which is then renamed over the
/// target, so a crash never leaves a half-written document.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Create a backend storing under `dir`
    ///
    /// # Errors
    /// Returns an error if `dir` cannot be created.
    pub fn new(dir: impl AsRef<Path>, namespace: &str) -> Result<Self, PersistenceError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(format!("{namespace}.json")),
        })
    }

    /// Location of the JSON document
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistencePort for JsonFileBackend {
    fn read(&self) -> Result<Option<PersistedAllowlist>, PersistenceError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, state: &PersistedAllowlist) -> Result<(), PersistenceError> {
        let json = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), version = state.version, "Persisted allowlist");
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
