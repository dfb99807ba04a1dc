//! Bounded conversation history for one session.
//!
//! Two bounds hold after every `add`: at most `max_turns * 2` non-system
//! messages, and an estimated token total (summary + retained messages)
//! within `max_tokens`. Overflowed messages are folded into a capped
//! summary rather than dropped silently.

use crate::message::{Message, Role};
use crate::summary::{fold_summary, ConcatSummarizer, Summarizer};
use crate::tokens::{estimate_message_tokens, estimate_tokens};

/// Hard cap applied to a single message's content, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Label prefixed to the synthetic summary message emitted by `build`.
pub const SUMMARY_LABEL: &str = "Conversation summary (older messages): ";

pub struct ConversationBuffer {
    messages: Vec<Message>,
    summary: Option<String>,
    max_turns: usize,
    max_tokens: usize,
    summarizer: Box<dyn Summarizer>,
}

impl std::fmt::Debug for ConversationBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationBuffer")
            .field("messages", &self.messages.len())
            .field("summary", &self.summary.as_deref().map(str::len))
            .field("max_turns", &self.max_turns)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl ConversationBuffer {
    pub fn new(max_turns: usize, max_tokens: usize) -> Self {
        Self::with_summarizer(max_turns, max_tokens, ConcatSummarizer::default())
    }

    pub fn with_summarizer(
        max_turns: usize,
        max_tokens: usize,
        summarizer: impl Summarizer + 'static,
    ) -> Self {
        Self {
            messages: Vec::new(),
            summary: None,
            max_turns,
            max_tokens,
            summarizer: Box::new(summarizer),
        }
    }

    /// Append a message (sanitized) and re-apply both bounds.
    pub fn add(&mut self, role: Role, content: &str) {
        let content = sanitize(content);
        self.messages.push(Message { role, content });
        self.trim();
    }

    /// Snapshot of the context to send upstream: the labeled summary
    /// message (if any) followed by all retained messages. A fresh copy;
    /// caller mutation cannot touch internal state.
    pub fn build(&self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        if let Some(summary) = &self.summary {
            out.push(Message::system(format!("{SUMMARY_LABEL}{summary}")));
        }
        out.extend(self.messages.iter().cloned());
        out
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.summary = None;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn non_system_len(&self) -> usize {
        self.messages.iter().filter(|m| !m.is_system()).count()
    }

    /// Estimated token total of summary plus retained messages.
    pub fn estimated_tokens(&self) -> usize {
        let summary_tokens = self
            .summary
            .as_deref()
            .map(estimate_tokens)
            .unwrap_or(0);
        summary_tokens
            + self
                .messages
                .iter()
                .map(estimate_message_tokens)
                .sum::<usize>()
    }

    /// Turn-trim then token-trim.
    ///
    /// Turn-trim: the oldest non-system messages beyond `max_turns * 2`
    /// are evicted and folded into the summary. Token-trim: oldest
    /// non-system messages popped first, system messages only once no
    /// non-system remain.
    fn trim(&mut self) {
        let excess = self
            .non_system_len()
            .saturating_sub(self.max_turns * 2);
        if excess > 0 {
            let evicted = self.evict_oldest_non_system(excess);
            let synopsis = self.summarizer.summarize(&evicted);
            if !synopsis.is_empty() {
                self.summary = Some(fold_summary(
                    self.summary.as_deref(),
                    &synopsis,
                    self.summarizer.cap(),
                ));
            }
        }

        while self.estimated_tokens() > self.max_tokens {
            let victim = self
                .messages
                .iter()
                .position(|m| !m.is_system())
                .or_else(|| (!self.messages.is_empty()).then_some(0));
            match victim {
                Some(index) => {
                    self.messages.remove(index);
                }
                None => {
                    // Only the summary remains; cut it down to budget.
                    if let Some(summary) = self.summary.take() {
                        let keep = self.max_tokens.saturating_mul(4);
                        self.summary =
                            Some(summary.chars().take(keep).collect()).filter(|s: &String| !s.is_empty());
                    }
                    break;
                }
            }
        }
    }

    fn evict_oldest_non_system(&mut self, count: usize) -> Vec<Message> {
        let mut evicted = Vec::with_capacity(count);
        let mut index = 0;
        while evicted.len() < count && index < self.messages.len() {
            if self.messages[index].is_system() {
                index += 1;
            } else {
                evicted.push(self.messages.remove(index));
            }
        }
        evicted
    }
}

/// Trim surrounding whitespace and hard-truncate to `MAX_MESSAGE_CHARS`
/// at a character boundary.
fn sanitize(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= MAX_MESSAGE_CHARS {
        trimmed.to_string()
    } else {
        trimmed.chars().take(MAX_MESSAGE_CHARS).collect()
    }
}
