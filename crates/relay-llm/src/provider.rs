use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use relay_core::Message;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Stream error: {0}")]
    Stream(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;

/// One decoded upstream stream element.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// An incremental fragment of assistant text.
    Token(String),
    /// The `[DONE]` sentinel; nothing follows.
    Done,
}

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// A streaming completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Start a streaming completion for the given message sequence.
    ///
    /// Fails before any token when the upstream rejects the request;
    /// failures after tokens have begun surface as a terminal `Err`
    /// item on the returned stream, never as a panic or a silent stop.
    async fn chat_stream(&self, messages: &[Message]) -> Result<TokenStream>;
}
