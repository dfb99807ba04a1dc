pub mod openrouter;
pub mod provider;
pub mod sse;

pub use openrouter::OpenRouterProvider;
pub use provider::{LlmError, LlmProvider, Result, StreamChunk, TokenStream};
