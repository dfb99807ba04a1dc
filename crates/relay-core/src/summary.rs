//! Deterministic summarization of evicted conversation history.
//!
//! No model call: evicted user/assistant content is concatenated and
//! hard-truncated. The result is lossy but cheap, synchronous, and
//! idempotent, which is what buffer trimming needs.

use crate::message::Message;

/// Hard cap on the stored summary, in characters.
pub const SUMMARY_CAP: usize = 1000;

/// Produces a bounded synopsis of evicted messages.
pub trait Summarizer: Send + Sync {
    /// Summarize evicted messages into a single string.
    ///
    /// Must be deterministic: identical input yields identical output.
    fn summarize(&self, evicted: &[Message]) -> String;

    /// Character cap the summary is truncated to.
    fn cap(&self) -> usize {
        SUMMARY_CAP
    }
}

/// Concatenates user/assistant content with single spaces, then
/// truncates to the cap. System messages are excluded from the input.
#[derive(Debug)]
pub struct ConcatSummarizer {
    cap: usize,
}

impl ConcatSummarizer {
    pub fn new(cap: usize) -> Self {
        Self { cap }
    }
}

impl Default for ConcatSummarizer {
    fn default() -> Self {
        Self::new(SUMMARY_CAP)
    }
}

impl Summarizer for ConcatSummarizer {
    fn summarize(&self, evicted: &[Message]) -> String {
        let text = evicted
            .iter()
            .filter(|m| !m.is_system())
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        truncate_chars(&text, self.cap)
    }

    fn cap(&self) -> usize {
        self.cap
    }
}

/// Fold new overflow text into an existing summary.
///
/// Replace-and-cap policy: concatenate, then truncate the whole thing
/// back to `cap`. Older summary text is squeezed out over time.
pub fn fold_summary(existing: Option<&str>, addition: &str, cap: usize) -> String {
    match existing {
        Some(prev) if !prev.is_empty() => {
            let mut combined = String::with_capacity(prev.len() + 1 + addition.len());
            combined.push_str(prev);
            combined.push(' ');
            combined.push_str(addition);
            truncate_chars(&combined, cap)
        }
        _ => truncate_chars(addition, cap),
    }
}

/// Truncate at a character boundary, never mid-codepoint.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}
