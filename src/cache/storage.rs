//! SQLite-backed persistent tier of the request cache
//!
//! Keeps Ready results between CLI invocations. Rows are keyed by the cache
//! key fingerprint; the serialized key is stored alongside so invalidation
//! predicates can be evaluated against it.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::key::CacheKey;
use crate::error::CacheError;

/// Schema version - increment to trigger nuke-and-rebuild
const SCHEMA_VERSION: i32 = 2;

type Result<T> = std::result::Result<T, CacheError>;

/// A persisted Ready result
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub data: Value,
    pub fetched_at: DateTime<Utc>,
    pub stale: bool,
}

/// SQLite-backed cache storage
pub struct CacheStorage {
    conn: Connection,
    db_path: PathBuf,
}

impl CacheStorage {
    /// Open or create cache storage at the default XDG cache location
    pub fn open() -> Result<Self> {
        let cache_dir = Self::cache_dir()?;
        Self::open_at(&cache_dir)
    }

    /// Get the cache directory path (~/.cache/adminop on Linux)
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_base = dirs::cache_dir().ok_or(CacheError::NoHome)?;
        Ok(cache_base.join("adminop"))
    }

    /// Open cache storage at a specific directory
    pub fn open_at(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create cache dir: {}", e)))?;

        let db_path = cache_dir.join("cache.db");
        let conn = Connection::open(&db_path)?;

        // Check schema version - nuke if mismatched
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |r| r.get(0))
            .unwrap_or(0);

        if version != 0 && version != SCHEMA_VERSION {
            log::info!(
                "Cache schema version mismatch ({} != {}), rebuilding",
                version,
                SCHEMA_VERSION
            );
            drop(conn);
            std::fs::remove_file(&db_path)
                .map_err(|e| CacheError::Io(format!("Failed to remove cache DB: {}", e)))?;
            return Self::open_at(cache_dir);
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                fingerprint TEXT PRIMARY KEY NOT NULL,
                resource TEXT NOT NULL,
                cache_key TEXT NOT NULL,
                data TEXT NOT NULL,
                fetched_at INTEGER NOT NULL,
                stale INTEGER NOT NULL DEFAULT 0,
                size_bytes INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_resource ON cache_entries(resource);
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(Self { conn, db_path })
    }

    /// Location of the database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Load a persisted result, stale or not
    pub fn get(&self, key: &CacheKey) -> Result<Option<StoredEntry>> {
        let row: Option<(String, i64, bool)> = self
            .conn
            .query_row(
                "SELECT data, fetched_at, stale FROM cache_entries WHERE fingerprint = ?1",
                params![key.fingerprint()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((data, fetched_at, stale)) = row else {
            return Ok(None);
        };

        let fetched_at = DateTime::from_timestamp_millis(fetched_at)
            .ok_or_else(|| CacheError::Encoding(format!("bad timestamp {}", fetched_at)))?;

        Ok(Some(StoredEntry {
            data: serde_json::from_str(&data)?,
            fetched_at,
            stale,
        }))
    }

    /// Store a Ready result, replacing any previous row for the key
    pub fn put(&self, key: &CacheKey, data: &Value, fetched_at: DateTime<Utc>) -> Result<()> {
        let body = serde_json::to_string(data)?;
        let key_json = serde_json::to_string(key)?;

        self.conn.execute(
            "INSERT OR REPLACE INTO cache_entries
             (fingerprint, resource, cache_key, data, fetched_at, stale, size_bytes)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
            params![
                key.fingerprint(),
                key.resource(),
                key_json,
                body,
                fetched_at.timestamp_millis(),
                body.len()
            ],
        )?;
        Ok(())
    }

    /// Mark every row whose key matches `predicate` as stale
    pub fn invalidate(&self, predicate: &dyn Fn(&CacheKey) -> bool) -> Result<usize> {
        let mut stmt = self
            .conn
            .prepare("SELECT fingerprint, cache_key FROM cache_entries WHERE stale = 0")?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut marked = 0;
        for (fingerprint, key_json) in rows {
            let key: CacheKey = match serde_json::from_str(&key_json) {
                Ok(key) => key,
                Err(e) => {
                    log::warn!("Dropping unreadable cache row {}: {}", fingerprint, e);
                    self.conn
                        .execute("DELETE FROM cache_entries WHERE fingerprint = ?1", [&fingerprint])?;
                    continue;
                }
            };

            if predicate(&key) {
                marked += self
                    .conn
                    .execute("UPDATE cache_entries SET stale = 1 WHERE fingerprint = ?1", [&fingerprint])?;
            }
        }

        Ok(marked)
    }

    /// Clear all cache entries
    pub fn clear_all(&self) -> Result<ClearStats> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))?;

        self.conn.execute("DELETE FROM cache_entries", [])?;

        Ok(ClearStats {
            entries_removed: count as usize,
        })
    }

    /// Get cache statistics
    pub fn stats(&self) -> Result<CacheStats> {
        let (total, stale, size): (i64, i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(stale), 0), COALESCE(SUM(size_bytes), 0)
             FROM cache_entries",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?;

        let (oldest, newest): (Option<i64>, Option<i64>) = self.conn.query_row(
            "SELECT MIN(fetched_at), MAX(fetched_at) FROM cache_entries",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT resource, COUNT(*) FROM cache_entries GROUP BY resource ORDER BY resource",
        )?;
        let per_resource = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? as usize)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(CacheStats {
            total_entries: total as usize,
            stale_entries: stale as usize,
            total_size_bytes: size as usize,
            oldest_entry: oldest.and_then(DateTime::from_timestamp_millis),
            newest_entry: newest.and_then(DateTime::from_timestamp_millis),
            per_resource,
        })
    }
}

/// Statistics about cache clear operation
#[derive(Debug)]
pub struct ClearStats {
    pub entries_removed: usize,
}

/// Statistics about cache state
#[derive(Debug)]
pub struct CacheStats {
    pub total_entries: usize,
    pub stale_entries: usize,
    pub total_size_bytes: usize,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
    pub per_resource: Vec<(String, usize)>,
}
