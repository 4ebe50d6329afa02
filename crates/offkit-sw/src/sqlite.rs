//! Durable SQLite cache backend.
//!
//! Partitions and entries persist to a single origin-scoped database file,
//! so cached responses survive process restarts.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use offkit_common::{OffkitError, Result};

use crate::store::{CacheBackend, CacheEntry, RequestKey};

/// Schema for the cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS partitions (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS entries (
    partition_name TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at INTEGER NOT NULL,
    PRIMARY KEY (partition_name, method, url)
);

CREATE INDEX IF NOT EXISTS idx_entries_partition ON entries(partition_name);
"#;

/// SQLite-backed cache storage.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open (or create) the cache database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(|e| {
            OffkitError::cache_with_source(
                format!("failed to open cache database at {}", path.display()),
                e,
            )
        })?;

        conn.execute_batch(CACHE_SCHEMA)
            .map_err(|e| OffkitError::cache_with_source("failed to run cache migrations", e))?;

        info!(path = %path.display(), "cache database opened");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| OffkitError::cache("cache database lock poisoned"))
    }
}

impl CacheBackend for SqliteBackend {
    fn open_partition(&self, name: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO partitions (name) VALUES (?)",
            params![name],
        )
        .map_err(|e| OffkitError::cache_with_source("failed to create partition", e))?;
        Ok(())
    }

    fn contains(&self, name: &str) -> Result<bool> {
        let conn = self.lock()?;
        let found: Option<String> = conn
            .query_row(
                "SELECT name FROM partitions WHERE name = ?",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| OffkitError::cache_with_source("failed to query partition", e))?;
        Ok(found.is_some())
    }

    fn partition_names(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT name FROM partitions ORDER BY name")
            .map_err(|e| OffkitError::cache_with_source("failed to prepare partition query", e))?;

        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| OffkitError::cache_with_source("failed to list partitions", e))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(names)
    }

    fn delete_partition(&self, name: &str) -> Result<bool> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM entries WHERE partition_name = ?",
            params![name],
        )
        .map_err(|e| OffkitError::cache_with_source("failed to delete partition entries", e))?;

        let deleted = conn
            .execute("DELETE FROM partitions WHERE name = ?", params![name])
            .map_err(|e| OffkitError::cache_with_source("failed to delete partition", e))?;

        Ok(deleted > 0)
    }

    fn lookup(&self, partition: &str, key: &RequestKey) -> Result<Option<CacheEntry>> {
        let conn = self.lock()?;
        let row: Option<(u16, String, Vec<u8>, u64)> = conn
            .query_row(
                "SELECT status, headers, body, cached_at FROM entries
                 WHERE partition_name = ? AND method = ? AND url = ?",
                params![partition, key.method, key.url],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| OffkitError::cache_with_source("failed to look up cache entry", e))?;

        match row {
            Some((status, headers_json, body, cached_at)) => {
                let headers = serde_json::from_str(&headers_json).map_err(|e| {
                    OffkitError::cache_with_source("failed to decode cached headers", e)
                })?;
                Ok(Some(CacheEntry {
                    key: key.clone(),
                    status,
                    headers,
                    body,
                    cached_at,
                }))
            }
            None => Ok(None),
        }
    }

    fn store(&self, partition: &str, entry: CacheEntry) -> Result<()> {
        if !self.contains(partition)? {
            return Err(OffkitError::NotFound(format!(
                "cache partition {partition}"
            )));
        }

        let headers = serde_json::to_string(&entry.headers)
            .map_err(|e| OffkitError::cache_with_source("failed to encode cached headers", e))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO entries
                 (partition_name, method, url, status, headers, body, cached_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                partition,
                entry.key.method,
                entry.key.url,
                entry.status,
                headers,
                entry.body,
                entry.cached_at
            ],
        )
        .map_err(|e| OffkitError::cache_with_source("failed to store cache entry", e))?;

        Ok(())
    }
}
