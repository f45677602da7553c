//! SQLite-based storage.

use super::{children_of, Storage, StorageEntry, StorageError};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS entries (
    key TEXT PRIMARY KEY NOT NULL,
    value BLOB NOT NULL
);
"#;

const DB_FILE: &str = "storage.db";

pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

fn backend_err(e: rusqlite::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

fn join_err(e: tokio::task::JoinError) -> StorageError {
    StorageError::Backend(format!("Task join error: {}", e))
}

impl SqliteStorage {
    pub async fn new(base_dir: PathBuf) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(&base_dir).await?;
        let db_path = base_dir.join(DB_FILE);

        // Open database in blocking task
        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path).map_err(backend_err)?;
            conn.execute_batch(SCHEMA).map_err(backend_err)?;
            Ok::<_, StorageError>(conn)
        })
        .await
        .map_err(join_err)??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> Result<Option<StorageEntry>, StorageError> {
        let conn = self.conn.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let value: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT value FROM entries WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(backend_err)?;
            Ok(value.map(|value| StorageEntry::new(key, value)))
        })
        .await
        .map_err(join_err)?
    }

    async fn put(&self, entry: StorageEntry) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            // Upsert keeps the original rowid so listing stays in insertion order.
            conn.execute(
                "INSERT INTO entries (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![entry.key, entry.value],
            )
            .map_err(backend_err)?;
            Ok(())
        })
        .await
        .map_err(join_err)?
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute("DELETE FROM entries WHERE key = ?1", params![key])
                .map_err(backend_err)?;
            Ok(())
        })
        .await
        .map_err(join_err)?
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let conn = self.conn.clone();
        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn
                .prepare(
                    "SELECT key FROM entries
                     WHERE substr(key, 1, length(?1)) = ?1
                     ORDER BY rowid",
                )
                .map_err(backend_err)?;
            let keys = stmt
                .query_map(params![prefix], |row| row.get::<_, String>(0))
                .map_err(backend_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(backend_err)?;
            Ok(children_of(&prefix, keys.iter().map(String::as_str)))
        })
        .await
        .map_err(join_err)?
    }
}
