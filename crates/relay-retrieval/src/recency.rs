//! Recency-ordered passage store.
//!
//! Placeholder for an external vector database behind the same
//! [`RetrievalBackend`] seam as the keyword scorer: entries are keyed
//! by a sha256 content digest and `search` returns the newest
//! passages, ignoring the query. Fits corpora where freshness beats
//! relevance, such as a rolling ingestion log.

use std::sync::RwLock;

use sha2::{Digest, Sha256};

use crate::store::{RetrievalBackend, RetrievalItem};

#[derive(Debug)]
struct Entry {
    id: String,
    item: RetrievalItem,
}

#[derive(Debug, Default)]
pub struct RecencyStore {
    entries: RwLock<Vec<Entry>>,
}

impl RecencyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn content_id(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

impl RetrievalBackend for RecencyStore {
    fn add(&self, text: &str, source: &str) {
        let id = content_id(text);
        let mut entries = self.entries.write().expect("recency store lock poisoned");
        // Re-adding identical text refreshes its position instead of
        // duplicating it.
        entries.retain(|entry| entry.id != id);
        entries.push(Entry {
            id,
            item: RetrievalItem {
                text: text.to_string(),
                source: source.to_string(),
            },
        });
    }

    fn search(&self, _query: &str, k: usize) -> Vec<RetrievalItem> {
        let entries = self.entries.read().expect("recency store lock poisoned");
        entries
            .iter()
            .rev()
            .take(k)
            .map(|entry| entry.item.clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.entries
            .read()
            .expect("recency store lock poisoned")
            .len()
    }

    fn clear(&self) {
        self.entries
            .write()
            .expect("recency store lock poisoned")
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> RecencyStore {
        let store = RecencyStore::new();
        store.add("first passage about rust", "a.md");
        store.add("second passage about python", "b.md");
        store.add("third passage about go", "c.md");
        store
    }

    #[test]
    fn search_returns_newest_first_regardless_of_query() {
        let store = seeded();
        let results = store.search("anything at all", 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, "c.md");
        assert_eq!(results[1].source, "b.md");
    }

    #[test]
    fn readding_identical_text_refreshes_position() {
        let store = seeded();
        store.add("first passage about rust", "a.md");

        assert_eq!(store.len(), 3);
        let results = store.search("query", 1);
        assert_eq!(results[0].source, "a.md");
    }

    #[test]
    fn search_respects_k() {
        let store = seeded();
        assert_eq!(store.search("query", 10).len(), 3);
        assert_eq!(store.search("query", 1).len(), 1);
    }

    #[test]
    fn clear_removes_everything() {
        let store = seeded();
        store.clear();
        assert!(store.is_empty());
        assert!(store.search("query", 3).is_empty());
    }
}
