//! Namespaced key-value persistence with a sensitive-key guard.
//!
//! [`SecureStorage`] is the only way the front end snapshots state. It
//! refuses keys that look like they hold secrets and never propagates a
//! backend failure: every operation reports success as a `bool` (or `None`
//! for reads).

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{error, warn};

/// Substrings (case-insensitive) that mark a key as sensitive
const SENSITIVE_KEY_MARKERS: &[&str] = &["password", "token", "secret"];

/// Storage backend failure
#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    /// Snapshot file does not hold a JSON object
    Corrupt { path: PathBuf },
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "storage I/O error: {}", e),
            StorageError::Serialization(e) => write!(f, "storage serialization error: {}", e),
            StorageError::Corrupt { path } => {
                write!(f, "storage snapshot {} is not a JSON object", path.display())
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            StorageError::Serialization(e) => Some(e),
            StorageError::Corrupt { .. } => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e)
    }
}

/// Raw string store behind [`SecureStorage`]
pub trait StorageBackend: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: String) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// In-process backend; contents are lost at exit
#[derive(Debug, Default)]
pub struct MemoryBackend {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }
}

/// Backend persisting all items as one JSON object file.
///
/// Every write rewrites the whole snapshot. A missing file reads as empty.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(StorageError::Corrupt {
                path: self.path.clone(),
            }),
        }
    }

    fn save(&self, items: &Map<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(items)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self
            .load()?
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut items = self.load()?;
        items.insert(key.to_string(), Value::String(value));
        self.save(&items)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut items = self.load()?;
        if items.remove(key).is_some() {
            self.save(&items)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.keys().cloned().collect())
    }
}

/// True if `key` names something that must never be persisted
pub fn is_sensitive_key(key: &str) -> bool {
    let lowered = key.to_lowercase();
    SENSITIVE_KEY_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Key-value facade over a [`StorageBackend`].
///
/// # Examples
///
/// ```
/// use narrative_guard::common::storage::{MemoryBackend, SecureStorage};
/// use serde_json::json;
///
/// let storage = SecureStorage::new(MemoryBackend::new(), "narrativeos_");
/// assert!(storage.set("theme", &json!("dark")));
/// assert_eq!(storage.get("theme"), Some(json!("dark")));
/// assert!(!storage.set("authToken", &json!("x")));
/// ```
pub struct SecureStorage {
    backend: Box<dyn StorageBackend>,
    prefix: String,
}

impl SecureStorage {
    pub fn new(backend: impl StorageBackend + 'static, prefix: impl Into<String>) -> Self {
        Self {
            backend: Box::new(backend),
            prefix: prefix.into(),
        }
    }

    /// In-memory storage with the given prefix
    pub fn in_memory(prefix: impl Into<String>) -> Self {
        Self::new(MemoryBackend::new(), prefix)
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Persist `value` as JSON. Sensitive keys and backend failures return false.
    pub fn set(&self, key: &str, value: &Value) -> bool {
        if is_sensitive_key(key) {
            warn!(key, "Attempted to store sensitive data");
            return false;
        }

        let result = serde_json::to_string(value)
            .map_err(StorageError::from)
            .and_then(|raw| self.backend.set_item(&self.namespaced(key), raw));
        match result {
            Ok(()) => true,
            Err(e) => {
                error!(key, error = %e, "Storage error");
                false
            }
        }
    }

    /// Read a value back; missing, unreadable or unparsable entries are `None`
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.backend.get_item(&self.namespaced(key)) {
            Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
            Ok(None) => None,
            Err(e) => {
                error!(key, error = %e, "Storage error");
                None
            }
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        match self.backend.remove_item(&self.namespaced(key)) {
            Ok(()) => true,
            Err(e) => {
                error!(key, error = %e, "Storage error");
                false
            }
        }
    }

    /// Remove every key under this storage's prefix, leaving others intact
    pub fn clear(&self) -> bool {
        let result = self.backend.keys().and_then(|keys| {
            keys.iter()
                .filter(|key| key.starts_with(&self.prefix))
                .try_for_each(|key| self.backend.remove_item(key))
        });
        match result {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Storage error");
                false
            }
        }
    }
}

impl std::fmt::Debug for SecureStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureStorage")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}
