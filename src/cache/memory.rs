//! Process-local translation cache.

use super::{normalize_language, CacheEntry, CacheKey, TranslationCache};
use crate::error::CacheError;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;

/// In-memory cache; lives as long as the value does.
#[derive(Default)]
pub struct MemoryCache {
    inner: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TranslationCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.inner.lock().get(key).cloned())
    }

    fn put(
        &self,
        key: &CacheKey,
        target_language: &str,
        model: &str,
        translated_text: &str,
        completion_tokens: Option<u64>,
    ) -> Result<(), CacheError> {
        self.inner.lock().entry(*key).or_insert_with(|| CacheEntry {
            key: *key,
            translated_text: translated_text.to_string(),
            target_language: normalize_language(target_language),
            model: model.to_string(),
            stored_at: Utc::now(),
            completion_tokens,
        });
        Ok(())
    }

    fn invalidate(&self, target_language: &str) -> Result<usize, CacheError> {
        let lang = normalize_language(target_language);
        let mut map = self.inner.lock();
        let before = map.len();
        map.retain(|_, e| e.target_language != lang);
        Ok(before - map.len())
    }

    fn clear_all(&self) -> Result<usize, CacheError> {
        let mut map = self.inner.lock();
        let n = map.len();
        map.clear();
        Ok(n)
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }

    fn name(&self) -> &str {
        "memory"
    }
}
