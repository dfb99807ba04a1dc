//! OpenRouter provider (OpenAI-compatible chat completions).

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use relay_core::Message;

use crate::provider::{LlmError, LlmProvider, Result, TokenStream};
use crate::sse::token_stream_from_sse;

pub const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_MODEL: &str = "deepseek/deepseek-chat";

pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenRouterProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.2,
            max_tokens: 2000,
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    async fn chat_stream(&self, messages: &[Message]) -> Result<TokenStream> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": true,
        });

        log::info!(
            "Starting stream request: model={}, temperature={}, max_tokens={}, messages={}",
            self.model,
            self.temperature,
            self.max_tokens,
            messages.len()
        );

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            log::error!("Completion request failed with status {}: {}", status, body);
            return Err(LlmError::Api { status, body });
        }

        log::debug!("Stream connection established");
        Ok(token_stream_from_sse(response))
    }
}
