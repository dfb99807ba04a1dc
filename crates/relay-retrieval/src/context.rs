//! Builds the retrieval system message injected ahead of conversation
//! history.

use std::sync::Arc;

use relay_core::Message;

use crate::store::RetrievalBackend;

/// Instruction preamble for retrieved knowledge.
pub const RETRIEVAL_PREAMBLE: &str = "You are provided with external knowledge. \
Use it ONLY if relevant. Do not mention that you are using documents.";

const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

pub struct ContextBuilder {
    store: Arc<dyn RetrievalBackend>,
    top_k: usize,
}

impl ContextBuilder {
    pub fn new(store: Arc<dyn RetrievalBackend>, top_k: usize) -> Self {
        Self { store, top_k }
    }

    /// A single system message embedding the best-matching passages, or
    /// `None` when the query is empty or nothing matches.
    ///
    /// Every passage carries the source tag it was stored with; sources
    /// are never invented here.
    pub fn build_context(&self, query: &str) -> Option<Message> {
        if query.trim().is_empty() {
            return None;
        }

        let items = self.store.search(query, self.top_k);
        if items.is_empty() {
            return None;
        }
        log::debug!("Retrieval matched {} passages", items.len());

        let blocks: Vec<String> = items
            .iter()
            .map(|item| format!("[Source: {}]\n{}", item.source, item.text))
            .collect();

        Some(Message::system(format!(
            "{RETRIEVAL_PREAMBLE}\n\nKnowledge:\n{}",
            blocks.join(BLOCK_SEPARATOR)
        )))
    }
}
