//! Key-value storage with pluggable backends.
//!
//! Supports:
//! - `memory`: In-memory storage (non-persistent, for testing)
//! - `file`: JSON snapshot file
//! - `sqlite`: SQLite table of key/value rows
//!
//! Every backend offers the same four primitives (get, put, delete, list by
//! prefix). There is no compare-and-swap and no transaction support, so
//! callers doing read-modify-write must serialize themselves.
//!
//! Any backend can be wrapped in [`SealedStorage`] to encrypt selected
//! entries at rest.

mod file;
mod memory;
mod sealed;
mod sqlite;

pub use file::FileStorage;
pub use memory::InMemoryStorage;
pub use sealed::{parse_seal_key, SealedStorage, SEAL_KEY_LENGTH};
pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode entry {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode entry {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("sealed entry {key} could not be opened: {reason}")]
    Seal { key: String, reason: String },
}

/// A single stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    pub key: String,
    pub value: Vec<u8>,
}

impl StorageEntry {
    pub fn new(key: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// Build an entry holding the JSON encoding of `value`.
    pub fn json<T: Serialize>(key: impl Into<String>, value: &T) -> Result<Self, StorageError> {
        let key = key.into();
        let value = serde_json::to_vec(value).map_err(|source| StorageError::Encode {
            key: key.clone(),
            source,
        })?;
        Ok(Self { key, value })
    }

    /// Decode the entry's JSON value.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, StorageError> {
        serde_json::from_slice(&self.value).map_err(|source| StorageError::Decode {
            key: self.key.clone(),
            source,
        })
    }
}

/// Storage trait - implemented by all storage backends.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    /// Fetch an entry, `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<StorageEntry>, StorageError>;

    /// Insert or overwrite an entry.
    async fn put(&self, entry: StorageEntry) -> Result<(), StorageError>;

    /// Remove an entry. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// List the children directly under `prefix`, with the prefix stripped.
    ///
    /// Nested keys collapse into a single `child/` entry. Order follows the
    /// backend's storage order and is not guaranteed to be sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Shared storage handle.
pub type SharedStorage = Arc<dyn Storage>;

/// Reduce full keys to the immediate children of `prefix`, preserving order.
pub(crate) fn children_of<'a>(prefix: &str, keys: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for key in keys {
        let Some(rest) = key.strip_prefix(prefix) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        let child = match rest.find('/') {
            Some(idx) => &rest[..=idx],
            None => rest,
        };
        if !out.iter().any(|existing| existing == child) {
            out.push(child.to_string());
        }
    }
    out
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageType {
    Memory,
    File,
    #[default]
    Sqlite,
}

impl StorageType {
    /// Parse from environment variable value.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "memory" | "inmem" => Self::Memory,
            "file" | "json" => Self::File,
            "sqlite" | "db" => Self::Sqlite,
            _ => Self::default(),
        }
    }
}

/// Create a storage backend based on type and configuration.
///
/// When `seal_key` is set, `config` and `role/*` entries are encrypted at rest.
pub async fn create_storage(
    store_type: StorageType,
    base_dir: PathBuf,
    seal_key: Option<[u8; SEAL_KEY_LENGTH]>,
) -> Result<SharedStorage, StorageError> {
    let inner: SharedStorage = match store_type {
        StorageType::Memory => Arc::new(InMemoryStorage::new()),
        StorageType::File => Arc::new(FileStorage::new(base_dir).await?),
        StorageType::Sqlite => Arc::new(SqliteStorage::new(base_dir).await?),
    };

    match seal_key {
        Some(key) => Ok(Arc::new(SealedStorage::new(
            inner,
            key,
            SealedStorage::default_prefixes(),
        ))),
        None => Ok(inner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_children_collapse_nested_keys() {
        let keys = ["role/a", "role/b/x", "role/b/y", "config", "role/c"];
        let children = children_of("role/", keys);
        assert_eq!(children, vec!["a", "b/", "c"]);
    }

    #[test]
    fn test_children_skip_prefix_itself() {
        let children = children_of("role/", ["role/", "role/a"]);
        assert_eq!(children, vec!["a"]);
    }

    #[test]
    fn test_entry_json_roundtrip() {
        let sample = Sample {
            name: "x".to_string(),
            count: 3,
        };
        let entry = StorageEntry::json("role/x", &sample).unwrap();
        assert_eq!(entry.key, "role/x");
        let decoded: Sample = entry.decode_json().unwrap();
        assert_eq!(decoded, sample);
    }

    #[test]
    fn test_decode_error_names_key() {
        let entry = StorageEntry::new("role/broken", b"not json".to_vec());
        let err = entry.decode_json::<Sample>().unwrap_err();
        assert!(err.to_string().contains("role/broken"));
    }

    #[test]
    fn test_storage_type_parse() {
        assert_eq!(StorageType::from_str("memory"), StorageType::Memory);
        assert_eq!(StorageType::from_str("JSON"), StorageType::File);
        assert_eq!(StorageType::from_str("db"), StorageType::Sqlite);
        assert_eq!(StorageType::from_str("bogus"), StorageType::Sqlite);
    }

    #[tokio::test]
    async fn test_create_memory_storage_with_seal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = create_storage(StorageType::Memory, dir.path().to_path_buf(), Some([9u8; 32]))
            .await
            .unwrap();
        assert!(!storage.is_persistent());

        storage
            .put(StorageEntry::new("config", b"{}".to_vec()))
            .await
            .unwrap();
        let entry = storage.get("config").await.unwrap().unwrap();
        assert_eq!(entry.value, b"{}".to_vec());
    }
}
