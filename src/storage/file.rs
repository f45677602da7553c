//! JSON file-based storage.
//!
//! The whole keyspace is held in memory and written back as a single
//! snapshot after every mutation (write to a temp file, then rename).

use super::{children_of, Storage, StorageEntry, StorageError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

const SNAPSHOT_FILE: &str = "storage.json";

/// On-disk layout: values are base64 so sealed and plain entries share one format.
#[derive(Debug, Serialize, Deserialize, Default)]
struct StorageSnapshot {
    entries: BTreeMap<String, String>,
}

#[derive(Clone)]
pub struct FileStorage {
    path: PathBuf,
    entries: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    persist_lock: Arc<Mutex<()>>,
}

impl FileStorage {
    pub async fn new(base_dir: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_dir).await?;
        let path = base_dir.join(SNAPSHOT_FILE);

        let snapshot = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<StorageSnapshot>(&bytes).map_err(|source| {
                StorageError::Decode {
                    key: path.display().to_string(),
                    source,
                }
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StorageSnapshot::default(),
            Err(err) => return Err(err.into()),
        };

        let mut entries = BTreeMap::new();
        for (key, encoded) in snapshot.entries {
            let value = BASE64.decode(encoded.as_bytes()).map_err(|e| {
                StorageError::Backend(format!("corrupt value for {} in snapshot: {}", key, e))
            })?;
            entries.insert(key, value);
        }

        tracing::debug!(path = %path.display(), count = entries.len(), "Loaded file storage");

        Ok(Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
            persist_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Apply `mutate` to a copy of the entries, write the copy out, and only
    /// then make it visible. A failed write leaves memory matching disk.
    async fn commit<F>(&self, mutate: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, Vec<u8>>) -> bool,
    {
        let _guard = self.persist_lock.lock().await;
        let mut next = self.entries.read().await.clone();
        if !mutate(&mut next) {
            return Ok(());
        }

        let snapshot = StorageSnapshot {
            entries: next
                .iter()
                .map(|(k, v)| (k.clone(), BASE64.encode(v)))
                .collect(),
        };
        let data = serde_json::to_vec_pretty(&snapshot).map_err(|source| StorageError::Encode {
            key: self.path.display().to_string(),
            source,
        })?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, data).await?;
        fs::rename(&tmp_path, &self.path).await?;

        *self.entries.write().await = next;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> Result<Option<StorageEntry>, StorageError> {
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .map(|value| StorageEntry::new(key, value.clone())))
    }

    async fn put(&self, entry: StorageEntry) -> Result<(), StorageError> {
        self.commit(|entries| {
            entries.insert(entry.key, entry.value);
            true
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.commit(|entries| entries.remove(key).is_some()).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.read().await;
        Ok(children_of(prefix, entries.keys().map(String::as_str)))
    }
}
