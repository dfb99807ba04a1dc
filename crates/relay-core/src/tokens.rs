//! Heuristic token estimation for budget trimming.
//!
//! Not a real tokenizer: the estimate is `max(1, chars / 4)`, the same
//! heuristic the upstream models are budgeted against. Good enough to
//! bound context growth, deliberately cheap.

use crate::message::Message;

/// Estimate the token count of a text.
pub fn estimate_tokens(text: &str) -> usize {
    std::cmp::max(1, text.chars().count() / 4)
}

/// Estimate the token count of a single message's content.
pub fn estimate_message_tokens(message: &Message) -> usize {
    estimate_tokens(&message.content)
}
