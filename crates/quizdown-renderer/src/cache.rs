//! Bounded memo of raw text to finished HTML.

use std::num::NonZeroUsize;

use lru::LruCache;
use serde::Serialize;

/// Counters since the cache was created or last cleared.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Least-recently-used cache keyed by the exact raw input text. Reads count as
/// uses, so a hit moves the entry to the most recent position.
pub struct RenderCache {
    entries: LruCache<String, String>,
    stats: CacheStats,
}

impl RenderCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    pub fn get(&mut self, text: &str) -> Option<String> {
        match self.entries.get(text) {
            Some(html) => {
                self.stats.hits += 1;
                Some(html.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Insert or overwrite. Inserting a new key into a full cache evicts the
    /// least recently used entry.
    pub fn put(&mut self, text: String, html: String) {
        if self.entries.contains(&text) {
            self.entries.put(text, html);
            return;
        }
        if let Some((evicted, _)) = self.entries.push(text, html) {
            self.stats.evictions += 1;
            tracing::trace!(len = evicted.len(), "evicted render cache entry");
        }
    }

    pub fn contains(&self, text: &str) -> bool {
        self.entries.contains(text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.entries.cap()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats = CacheStats::default();
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

impl std::fmt::Debug for RenderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.entries.cap())
            .field("stats", &self.stats)
            .finish()
    }
}
