//! Retrieval store capability and its keyword-overlap backend.
//!
//! The backend is a deliberately named placeholder for real embedding
//! search: callers depend only on `RetrievalBackend`, so an embedding
//! or external-service implementation can be swapped in without
//! touching the context builder.

use std::collections::HashSet;
use std::sync::RwLock;

/// A stored passage and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalItem {
    pub text: String,
    pub source: String,
}

/// Capability interface for passage lookup.
///
/// Writes happen in an offline ingestion phase; `search` is safe for
/// concurrent lookups while serving.
pub trait RetrievalBackend: Send + Sync {
    /// Append a passage. Insertion order is preserved.
    fn add(&self, text: &str, source: &str);

    /// The `k` best-scoring items for the query, best first.
    fn search(&self, query: &str, k: usize) -> Vec<RetrievalItem>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all stored passages. The only supported deletion.
    fn clear(&self);
}

/// Word-overlap scorer: `|words(query) ∩ words(text)| / |words(query)|`.
///
/// Zero-overlap items are excluded; ties keep insertion order.
#[derive(Debug, Default)]
pub struct KeywordStore {
    items: RwLock<Vec<RetrievalItem>>,
}

impl KeywordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn words(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect()
}

fn overlap_score(query_words: &HashSet<String>, text: &str) -> f64 {
    if query_words.is_empty() {
        return 0.0;
    }
    let text_words = words(text);
    let hits = query_words.intersection(&text_words).count();
    hits as f64 / query_words.len() as f64
}

impl RetrievalBackend for KeywordStore {
    fn add(&self, text: &str, source: &str) {
        self.items
            .write()
            .expect("retrieval store lock poisoned")
            .push(RetrievalItem {
                text: text.to_string(),
                source: source.to_string(),
            });
    }

    fn search(&self, query: &str, k: usize) -> Vec<RetrievalItem> {
        let query_words = words(query);
        let items = self.items.read().expect("retrieval store lock poisoned");

        let mut scored: Vec<(f64, &RetrievalItem)> = items
            .iter()
            .map(|item| (overlap_score(&query_words, &item.text), item))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        // Stable sort keeps insertion order for equal scores.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(k)
            .map(|(_, item)| item.clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.items
            .read()
            .expect("retrieval store lock poisoned")
            .len()
    }

    fn clear(&self) {
        self.items
            .write()
            .expect("retrieval store lock poisoned")
            .clear();
    }
}
