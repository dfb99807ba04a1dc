use std::sync::Arc;
use std::time::Duration;

use relay_retrieval::ContextBuilder;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI coding assistant. Answer clearly and concisely.";

/// Upper bound on upstream silence before a turn is abandoned.
pub const DEFAULT_STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Per-turn configuration handed to the runner.
#[derive(Clone)]
pub struct TurnConfig {
    /// Base system prompt placed first in every outbound sequence.
    pub system_prompt: String,
    /// Retrieval augmentation; `None` disables it.
    pub retrieval: Option<Arc<ContextBuilder>>,
    /// Maximum wait between upstream chunks before the turn fails.
    pub stream_idle_timeout: Duration,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            retrieval: None,
            stream_idle_timeout: DEFAULT_STREAM_IDLE_TIMEOUT,
        }
    }
}
