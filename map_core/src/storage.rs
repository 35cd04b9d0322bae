//! Persistence utilities
//!
//! Key-value storage for the persisted map configuration snapshots, plus TOML
//! settings files under the platform config directory.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to determine config directory
    #[error("could not determine config directory")]
    NoConfigDir,
    /// IO error while reading/writing
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Failed to parse a TOML settings file
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Failed to serialize a TOML settings file
    #[error("serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// Stored JSON could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The backend refused the operation
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A string key-value store, the shape of browser local storage.
pub trait ConfigStorage {
    /// Read the value under `key`, `None` if absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// Write `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Remove `key`. Removing an absent key is not an error.
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// Get the base configuration directory for the garden map
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "garden-map", "garden_map")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the settings file path for a named settings file
pub fn settings_path(name: &str) -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(format!("{}.toml", name)))
}

/// Load a TOML settings file
///
/// Returns `None` if the file doesn't exist yet.
/// Returns an error if the file exists but can't be parsed.
pub fn load_settings<T: DeserializeOwned>(name: &str) -> Result<Option<T>, StorageError> {
    let path = settings_path(name).ok_or(StorageError::NoConfigDir)?;

    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&path)?;
    let settings: T = toml::from_str(&contents)?;
    Ok(Some(settings))
}

/// Save a TOML settings file
pub fn save_settings<T: Serialize>(name: &str, settings: &T) -> Result<(), StorageError> {
    let path = settings_path(name).ok_or(StorageError::NoConfigDir)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(settings)?;
    fs::write(&path, contents)?;
    Ok(())
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Storage rooted at `<config dir>/storage`.
    pub fn default_location() -> Result<Self, StorageError> {
        let dir = config_dir().ok_or(StorageError::NoConfigDir)?;
        Ok(Self::new(dir.join("storage")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

impl ConfigStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// In-memory storage. Clones share the same underlying map, so a caller can
/// keep a handle and inspect what a store persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current raw value under `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }
}

impl ConfigStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.raw(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Read and decode a JSON value stored under `key`.
///
/// Absent keys and undecodable content both yield `Ok(None)`; only backend
/// failures are errors.
pub fn read_json<T: DeserializeOwned>(
    storage: &dyn ConfigStorage,
    key: &str,
) -> Result<Option<T>, StorageError> {
    let Some(raw) = storage.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!("Ignoring malformed value under '{}': {}", key, e);
            Ok(None)
        }
    }
}

/// Encode `value` as JSON and store it under `key`.
pub fn write_json<T: Serialize>(
    storage: &mut dyn ConfigStorage,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    storage.set(key, &raw)
}
