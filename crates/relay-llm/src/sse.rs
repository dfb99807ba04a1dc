//! SSE -> [`TokenStream`] decoding.
//!
//! Each `data:` payload is resolved to an explicit [`Parsed`] value so
//! the skip policy stays auditable: a corrupt chunk is dropped and the
//! stream continues, while transport-level failures become a terminal
//! `Err` item.

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::Response;
use serde::Deserialize;

use crate::provider::{LlmError, StreamChunk, TokenStream};

/// Outcome of parsing one SSE data payload.
#[derive(Debug, PartialEq)]
pub enum Parsed {
    /// A decoded chunk to emit downstream.
    Event(StreamChunk),
    /// Nothing to emit: empty payload, delta without content, or a
    /// malformed chunk that must not abort the stream.
    Skip,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Deserialize, Default)]
struct Delta {
    content: Option<String>,
}

/// Decode one `data:` payload.
pub fn parse_sse_data(data: &str) -> Parsed {
    let data = data.trim();
    if data.is_empty() {
        return Parsed::Skip;
    }
    if data == "[DONE]" {
        return Parsed::Event(StreamChunk::Done);
    }

    match serde_json::from_str::<CompletionChunk>(data) {
        Ok(chunk) => match chunk.choices.into_iter().next().and_then(|c| c.delta.content) {
            Some(content) => Parsed::Event(StreamChunk::Token(content)),
            None => Parsed::Skip,
        },
        Err(err) => {
            log::warn!("Skipping malformed stream chunk: {}", err);
            Parsed::Skip
        }
    }
}

/// Convert a streaming SSE [`Response`] body into a [`TokenStream`].
///
/// Blank lines and non-data framing are handled by the SSE parser;
/// transport errors are mapped to `LlmError::Stream` items.
pub fn token_stream_from_sse(response: Response) -> TokenStream {
    let stream = response
        .bytes_stream()
        .eventsource()
        .map(|event| match event {
            Ok(event) => Ok(parse_sse_data(&event.data)),
            Err(err) => Err(LlmError::Stream(err.to_string())),
        })
        .filter_map(|result| async move {
            match result {
                Ok(Parsed::Event(chunk)) => Some(Ok(chunk)),
                Ok(Parsed::Skip) => None,
                Err(err) => Some(Err(err)),
            }
        });

    Box::pin(stream)
}
