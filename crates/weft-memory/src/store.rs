use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use weft_core::error::{Result, WeftError};
use weft_core::traits::Memory;
use weft_core::types::MemoryCategory;

/// SQLite-backed memory store.
///
/// Persists the key/value table and the categorized event log across
/// process restarts. Plan state itself is never persisted; only what the
/// executor and tools explicitly write through the `Memory` trait.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS kv (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        category TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        timestamp TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_events_category ON events(category, id);
";

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| WeftError::Memory(format!("Failed to create db directory: {}", e)))?;
        }

        let conn =
            Connection::open(path).map_err(|e| WeftError::Memory(e.to_string()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| WeftError::Memory(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| WeftError::Memory(e.to_string()))?;

        debug!(path = %path.display(), "SQLite memory store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| WeftError::Memory(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| WeftError::Memory(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Count of events in one category.
    pub fn event_count(&self, category: MemoryCategory) -> Result<u64> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.query_row(
            "SELECT COUNT(*) FROM events WHERE category = ?1",
            params![category.as_str()],
            |row| row.get(0),
        )
        .map_err(|e| WeftError::Memory(e.to_string()))
    }
}

impl Memory for SqliteStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<serde_json::Value>>> {
        let result = (|| {
            let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
            let raw: Option<String> = conn
                .query_row(
                    "SELECT value FROM kv WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| WeftError::Memory(e.to_string()))?;
            match raw {
                Some(text) => Ok(Some(serde_json::from_str(&text)?)),
                None => Ok(None),
            }
        })();
        Box::pin(async move { result })
    }

    fn set(&self, key: &str, value: serde_json::Value) -> BoxFuture<'_, Result<()>> {
        let result = (|| {
            let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
            conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value.to_string()],
            )
            .map_err(|e| WeftError::Memory(e.to_string()))?;
            Ok(())
        })();
        Box::pin(async move { result })
    }

    fn remember(
        &self,
        category: MemoryCategory,
        key: &str,
        value: serde_json::Value,
    ) -> BoxFuture<'_, Result<()>> {
        let result = (|| {
            let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
            conn.execute(
                "INSERT INTO events (category, key, value, timestamp)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    category.as_str(),
                    key,
                    value.to_string(),
                    Utc::now().to_rfc3339()
                ],
            )
            .map_err(|e| WeftError::Memory(e.to_string()))?;
            Ok(())
        })();
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_kv_overwrite() {
        let store = SqliteStore::in_memory().unwrap();
        store.set("k", json!({"a": 1})).await.unwrap();
        store.set("k", json!({"a": 2})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"a": 2})));
        assert_eq!(store.get("other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remember_appends() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .remember(MemoryCategory::TaskHistory, "node:a", json!({"ok": true}))
            .await
            .unwrap();
        store
            .remember(MemoryCategory::TaskHistory, "node:b", json!({"ok": true}))
            .await
            .unwrap();
        store
            .remember(MemoryCategory::Preference, "tone", json!("terse"))
            .await
            .unwrap();

        assert_eq!(store.event_count(MemoryCategory::TaskHistory).unwrap(), 2);
        assert_eq!(store.event_count(MemoryCategory::Preference).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("persisted", json!(42)).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("persisted").await.unwrap(), Some(json!(42)));
    }
}
