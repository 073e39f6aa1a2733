//! Key/value persistence with `SQLite`.

use super::{KeyValueStore, StorageError, check_quota, entry_size};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

const SCHEMA_VERSION: i32 = 1;

pub struct SqliteStore {
    db: Mutex<Connection>,
    quota: Option<usize>,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Backend(format!(
                    "Failed to create storage directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let db = Connection::open(path)?;
        db.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(db)
    }

    /// Open a store that lives only as long as this value.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Reject writes that would bring the total stored size above `quota` bytes.
    #[must_use]
    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = Some(quota);
        self
    }

    fn from_connection(db: Connection) -> Result<Self, StorageError> {
        init_schema(&db)?;
        Ok(Self {
            db: Mutex::new(db),
            quota: None,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn init_schema(db: &Connection) -> Result<(), StorageError> {
    let version: i32 = db.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    // Migration v0 -> v1: Initial schema
    if version < SCHEMA_VERSION {
        db.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS kv (
                key         TEXT PRIMARY KEY,
                value       TEXT NOT NULL,
                updated_at  INTEGER NOT NULL
            );

            PRAGMA user_version = 1;
            ",
        )?;
    }

    Ok(())
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let raw: Option<String> = self
            .lock()
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;

        Ok(raw.map(|raw| serde_json::from_str(&raw)).transpose()?)
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let serialized = serde_json::to_string(value)?;
        let now = chrono::Utc::now().timestamp();

        let mut db = self.lock();
        let tx = db.transaction()?;

        if self.quota.is_some() {
            let others: i64 = tx.query_row(
                r"
                SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
                FROM kv WHERE key != ?1
                ",
                params![key],
                |row| row.get(0),
            )?;
            let others = usize::try_from(others).unwrap_or(usize::MAX);
            check_quota(
                self.quota,
                others.saturating_add(entry_size(key, &serialized)),
            )?;
        }

        tx.execute(
            r"
            INSERT INTO kv (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
            params![key, serialized, now],
        )?;
        tx.commit()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_set_and_get() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("storage.db")).unwrap();

        assert!(store.get("sessions").await.unwrap().is_none());
        store
            .set("sessions", &json!([{ "id": "1-a", "name": "Work" }]))
            .await
            .unwrap();
        let loaded = store.get("sessions").await.unwrap().unwrap();
        assert_eq!(loaded[0]["name"], "Work");
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("restoreDelay", &json!(3)).await.unwrap();
        store.set("restoreDelay", &json!(5)).await.unwrap();
        assert_eq!(store.get("restoreDelay").await.unwrap(), Some(json!(5)));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("restoreTarget", &json!("new-window")).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(
            store.get("restoreTarget").await.unwrap(),
            Some(json!("new-window"))
        );
    }

    #[tokio::test]
    async fn test_quota_rejects_and_keeps_old_value() {
        let store = SqliteStore::open_in_memory().unwrap().with_quota(64);
        store.set("sessions", &json!(["a"])).await.unwrap();

        let err = store
            .set("sessions", &json!(["x".repeat(100)]))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
        assert_eq!(store.get("sessions").await.unwrap(), Some(json!(["a"])));
    }
}
