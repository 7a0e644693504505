//! Persistent translation cache backed by SQLite.

use super::{normalize_language, CacheEntry, CacheKey, TranslationCache};
use crate::error::CacheError;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// SQLite-backed translation cache.
///
/// One connection behind a mutex: every operation is a single short
/// statement, so contention between dispatch tasks is negligible.
pub struct SqliteCache {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteCache {
    /// Open (or create) the cache database at the given path, creating
    /// parent directories as needed.
    pub fn open(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::Unavailable(format!("cannot create '{}': {e}", parent.display()))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| CacheError::Unavailable(format!("failed to open SQLite cache: {e}")))?;
        Self::init(conn, db_path.to_path_buf())
    }

    /// A private in-memory database. Same semantics, no persistence.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CacheError::Unavailable(format!("failed to open SQLite cache: {e}")))?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> Result<Self, CacheError> {
        // WAL lets a second process read while this one writes.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| CacheError::Unavailable(format!("PRAGMA failed: {e}")))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS translation_cache (
                cache_key BLOB PRIMARY KEY,
                translated_text TEXT NOT NULL,
                tgt_lang TEXT NOT NULL,
                model TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                completion_tokens INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_cache_tgt_lang
                ON translation_cache(tgt_lang);",
        )
        .map_err(|e| CacheError::Unavailable(format!("create table failed: {e}")))?;

        // Caches written before token accounting lack the column.
        if conn
            .prepare("SELECT completion_tokens FROM translation_cache LIMIT 0")
            .is_err()
        {
            conn.execute_batch(
                "ALTER TABLE translation_cache ADD COLUMN completion_tokens INTEGER;",
            )
            .map_err(|e| CacheError::Unavailable(format!("migration failed: {e}")))?;
        }

        info!(path = %path.display(), "SQLite translation cache opened");

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TranslationCache for SqliteCache {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT translated_text, tgt_lang, model, created_at, completion_tokens
                 FROM translation_cache WHERE cache_key = ?1",
                params![key.as_bytes().as_slice()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((translated_text, target_language, model, created_at, completion_tokens)) = row
        else {
            return Ok(None);
        };
        let stored_at: DateTime<Utc> = Utc
            .timestamp_opt(created_at, 0)
            .single()
            .ok_or_else(|| CacheError::Corrupt(format!("bad timestamp {created_at}")))?;

        debug!(key = ?key, "cache hit");
        Ok(Some(CacheEntry {
            key: *key,
            translated_text,
            target_language,
            model,
            stored_at,
            completion_tokens: completion_tokens.and_then(|n| u64::try_from(n).ok()),
        }))
    }

    fn put(
        &self,
        key: &CacheKey,
        target_language: &str,
        model: &str,
        translated_text: &str,
        completion_tokens: Option<u64>,
    ) -> Result<(), CacheError> {
        let conn = self.conn.lock();
        // OR IGNORE: the first stored translation for a key is kept.
        conn.execute(
            "INSERT OR IGNORE INTO translation_cache
             (cache_key, translated_text, tgt_lang, model, created_at, completion_tokens)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                key.as_bytes().as_slice(),
                translated_text,
                normalize_language(target_language),
                model,
                Utc::now().timestamp(),
                completion_tokens.and_then(|n| i64::try_from(n).ok()),
            ],
        )?;
        Ok(())
    }

    fn invalidate(&self, target_language: &str) -> Result<usize, CacheError> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM translation_cache WHERE tgt_lang = ?1",
            params![normalize_language(target_language)],
        )?;
        info!(language = target_language, removed, "cache invalidated");
        Ok(removed)
    }

    fn clear_all(&self) -> Result<usize, CacheError> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM translation_cache", [])?;
        info!(removed, "cache cleared");
        Ok(removed)
    }

    fn len(&self) -> usize {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM translation_cache", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|n| n as usize)
        .unwrap_or(0)
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
