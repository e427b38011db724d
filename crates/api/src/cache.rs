use dashmap::DashMap;
use ingest::Document;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Annotated documents keyed by a hash of the input document.
pub struct DocumentCache {
    documents: Arc<DashMap<String, Document>>,
    max_entries: usize,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl DocumentCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            documents: Arc::new(DashMap::new()),
            max_entries,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Content key of an unprocessed document.
    pub fn key(document: &Document) -> String {
        let mut hasher = Sha256::new();
        // serializing an in-memory document cannot fail
        let bytes = serde_json::to_vec(document).unwrap_or_default();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<Document> {
        match self.documents.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: String, document: Document) {
        if self.max_entries == 0 {
            return;
        }
        if self.documents.len() >= self.max_entries {
            // Simple eviction: clear 25% when full
            let to_remove: Vec<_> = self
                .documents
                .iter()
                .take((self.max_entries / 4).max(1))
                .map(|r| r.key().clone())
                .collect();
            for key in to_remove {
                self.documents.remove(&key);
            }
        }
        self.documents.insert(key, document);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            documents_cached: self.documents.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.documents.clear();
    }
}

#[derive(Debug, serde::Serialize)]
pub struct CacheStats {
    pub documents_cached: usize,
    pub hits: usize,
    pub misses: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> Document {
        Document {
            id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_key_depends_on_content() {
        assert_eq!(DocumentCache::key(&doc("a")), DocumentCache::key(&doc("a")));
        assert_ne!(DocumentCache::key(&doc("a")), DocumentCache::key(&doc("b")));
    }

    #[test]
    fn test_hit_and_miss() {
        let cache = DocumentCache::new(10);
        let key = DocumentCache::key(&doc("a"));
        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), doc("a"));
        assert_eq!(cache.get(&key).unwrap().id, "a");

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn test_eviction_when_full() {
        let cache = DocumentCache::new(8);
        for i in 0..8 {
            cache.insert(format!("k{}", i), doc(&i.to_string()));
        }
        assert_eq!(cache.stats().documents_cached, 8);

        cache.insert("k8".to_string(), doc("8"));
        // a quarter evicted, then the new entry added
        assert_eq!(cache.stats().documents_cached, 7);
        assert!(cache.get("k8").is_some());
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = DocumentCache::new(0);
        cache.insert("k".to_string(), doc("a"));
        assert_eq!(cache.stats().documents_cached, 0);
    }
}
