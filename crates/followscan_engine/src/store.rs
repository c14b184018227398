use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use followscan_core::ExtensionState;
use scan_logging::{scan_debug, scan_warn};
use thiserror::Error;

use crate::persist::{replace_atomically, PersistError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file error: {0}")]
    Io(#[from] io::Error),
    #[error("state file error: {0}")]
    Persist(#[from] PersistError),
    #[error("could not encode state: {0}")]
    Encode(String),
    #[error("invalid state path: {0}")]
    Path(String),
}

/// Durable home of the single [`ExtensionState`] record.
///
/// Outlives the coordinator; any context may read it after a gap.
pub trait StateStore: Send + Sync {
    /// Current record, or the idle default when none exists.
    fn read(&self) -> Result<ExtensionState, StoreError>;

    /// Replace the whole record.
    fn write(&self, state: &ExtensionState) -> Result<(), StoreError>;

    fn clear(&self) -> Result<(), StoreError>;
}

/// Process-wide store; clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    record: Arc<Mutex<Option<ExtensionState>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: ExtensionState) -> Self {
        Self {
            record: Arc::new(Mutex::new(Some(state))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ExtensionState>> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateStore for MemoryStateStore {
    fn read(&self) -> Result<ExtensionState, StoreError> {
        Ok(self.lock().clone().unwrap_or_default())
    }

    fn write(&self, state: &ExtensionState) -> Result<(), StoreError> {
        *self.lock() = Some(state.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.lock() = None;
        Ok(())
    }
}

/// RON file on disk, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        if path.file_name().is_none() {
            return Err(StoreError::Path(path.display().to_string()));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn read(&self) -> Result<ExtensionState, StoreError> {
        let path = &self.path;
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(ExtensionState::idle());
            }
            Err(err) => return Err(err.into()),
        };

        let state: ExtensionState = match ron::from_str(&content) {
            Ok(state) => state,
            Err(err) => {
                scan_warn!("Failed to parse persisted state from {:?}: {}", path, err);
                return Ok(ExtensionState::idle());
            }
        };
        if let Err(err) = state.validate() {
            scan_warn!("Discarding inconsistent persisted state {:?}: {}", path, err);
            return Ok(ExtensionState::idle());
        }
        Ok(state)
    }

    fn write(&self, state: &ExtensionState) -> Result<(), StoreError> {
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(state, pretty)
            .map_err(|err| StoreError::Encode(err.to_string()))?;

        replace_atomically(&self.path, content.as_bytes())?;
        scan_debug!("Persisted state {:?} to {:?}", state.status, self.path);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
