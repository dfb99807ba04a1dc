use serde::{Deserialize, Serialize};

/// Events produced while relaying one model response to a client.
///
/// A stream consists of any number of `Token` events followed by exactly
/// one terminal event (`Done` or `Error`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum StreamEvent {
    Token(String),
    Error(String),
    Done,
}

impl StreamEvent {
    /// SSE event name for this variant.
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Token(_) => "token",
            StreamEvent::Error(_) => "error",
            StreamEvent::Done => "done",
        }
    }

    /// SSE data payload. `Done` carries the `[DONE]` sentinel.
    pub fn data(&self) -> &str {
        match self {
            StreamEvent::Token(data) | StreamEvent::Error(data) => data,
            StreamEvent::Done => "[DONE]",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error(_))
    }
}
