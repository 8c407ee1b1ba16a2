//! Durable storage collaborators for the overlay.
//!
//! [`Storage`] is a plain key-value store. [`Persistence`] is what the overlay
//! store talks to; [`KeyValuePersistence`] adapts any [`Storage`] by keeping
//! the envelope under a single well-known key.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use thiserror::Error;

use crate::overlay::StoredEnvelope;

/// Key the overlay envelope is stored under.
pub const OVERLAY_KEY: &str = "user-config-storage";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),
}

pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError>;
}

/// In-memory storage, mostly useful in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// One JSON file per key under a root directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read(path)?))
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let final_path = self.path_for(key)?;
        fs::create_dir_all(&self.root)?;
        let tmp_path = final_path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(value)?;
        file.sync_all()?;
        fs::rename(tmp_path, final_path)?;
        Ok(())
    }
}

/// Load and save the versioned overlay envelope.
pub trait Persistence {
    fn load(&self) -> Result<Option<StoredEnvelope>, StorageError>;
    fn save(&mut self, envelope: &StoredEnvelope) -> Result<(), StorageError>;
}

impl<P: Persistence + ?Sized> Persistence for Box<P> {
    fn load(&self) -> Result<Option<StoredEnvelope>, StorageError> {
        (**self).load()
    }

    fn save(&mut self, envelope: &StoredEnvelope) -> Result<(), StorageError> {
        (**self).save(envelope)
    }
}

/// Keeps the envelope as JSON under [`OVERLAY_KEY`].
#[derive(Debug, Clone, Default)]
pub struct KeyValuePersistence<S> {
    storage: S,
}

impl<S: Storage> KeyValuePersistence<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_inner(self) -> S {
        self.storage
    }
}

impl<S: Storage> Persistence for KeyValuePersistence<S> {
    fn load(&self) -> Result<Option<StoredEnvelope>, StorageError> {
        match self.storage.get(OVERLAY_KEY)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, envelope: &StoredEnvelope) -> Result<(), StorageError> {
        let payload = serde_json::to_vec_pretty(envelope)?;
        self.storage.set(OVERLAY_KEY, &payload)
    }
}
