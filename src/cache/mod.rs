//! Content-addressed translation cache.
//!
//! Key: blake3 over (source text, target language, model). Two units with the
//! same text, language and model share one entry; that sharing is the
//! de-duplication the dispatcher relies on, not an accident.
//!
//! Backends:
//! * [`SqliteCache`]: durable, survives process restarts (the default).
//! * [`MemoryCache`]: process-local, for tests and embedding.
//! * [`NoCache`]: the degraded mode used when storage is unavailable and
//!   the run tolerates it. Every lookup misses, every store is dropped.
//!
//! Entries are written once. A second `put` for an existing key keeps the
//! first value (first writer wins), in every backend.

mod memory;
mod sqlite;

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

use crate::error::CacheError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fingerprint of a `(source text, target language, model)` tuple.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Compute the key. The language is compared case-insensitively
    /// ("French" and "french " hit the same entry); text and model are exact.
    pub fn compute(source_text: &str, target_language: &str, model: &str) -> Self {
        let lang = normalize_language(target_language);
        let mut hasher = blake3::Hasher::new();
        // Length prefixes keep ("ab","c") and ("a","bc") apart.
        for part in [source_text, lang.as_str(), model] {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({}…)", &self.to_hex()[..12])
    }
}

impl TryFrom<&[u8]> for CacheKey {
    type Error = CacheError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CacheError::Corrupt(format!("key has {} bytes, want 32", bytes.len())))?;
        Ok(Self(arr))
    }
}

/// A stored translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub translated_text: String,
    /// Normalised (trimmed, lowercase) target language.
    pub target_language: String,
    pub model: String,
    pub stored_at: DateTime<Utc>,
    /// Completion tokens the translation cost when it was produced, if known.
    #[serde(default)]
    pub completion_tokens: Option<u64>,
}

/// Pluggable translation cache backend.
///
/// All methods take `&self`; backends use interior mutability so one
/// instance can be shared by every concurrent dispatch task.
pub trait TranslationCache: Send + Sync {
    /// Local lookup. `Ok(None)` when absent.
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;

    /// Store a translation. Keeps the existing value if the key is present.
    fn put(
        &self,
        key: &CacheKey,
        target_language: &str,
        model: &str,
        translated_text: &str,
        completion_tokens: Option<u64>,
    ) -> Result<(), CacheError>;

    /// Remove every entry for `target_language`; returns how many went.
    fn invalidate(&self, target_language: &str) -> Result<usize, CacheError>;

    /// Remove every entry; returns how many went.
    fn clear_all(&self) -> Result<usize, CacheError>;

    /// Total number of entries (0 if unknown).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human-readable backend name (for logging/reports).
    fn name(&self) -> &str;
}

/// Cache that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl TranslationCache for NoCache {
    fn get(&self, _key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        Ok(None)
    }

    fn put(
        &self,
        _: &CacheKey,
        _: &str,
        _: &str,
        _: &str,
        _: Option<u64>,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    fn invalidate(&self, _target_language: &str) -> Result<usize, CacheError> {
        Ok(0)
    }

    fn clear_all(&self) -> Result<usize, CacheError> {
        Ok(0)
    }

    fn len(&self) -> usize {
        0
    }

    fn name(&self) -> &str {
        "none"
    }
}

pub(crate) fn normalize_language(lang: &str) -> String {
    lang.trim().to_lowercase()
}
