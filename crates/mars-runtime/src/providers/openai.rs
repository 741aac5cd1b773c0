//! OpenAI chat-completions provider.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use mars_core::{Message, TokenUsage};

use super::sse::{ensure_success, lines, sse_data};
use super::{ApiCredential, CallOptions, LlmProvider, ProviderError, TextStream};
use futures::StreamExt;

/// OpenAI API request format.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

/// OpenAI API response format.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize, Default)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl From<&WireUsage> for TokenUsage {
    fn from(usage: &WireUsage) -> Self {
        TokenUsage::new(usage.prompt_tokens, usage.completion_tokens)
    }
}

/// OpenAI provider.
pub struct OpenAiProvider {
    api_key: ApiCredential,
    default_model: String,
    base_url: String,
    client: reqwest::Client,
    last_usage: Arc<Mutex<TokenUsage>>,
}

impl OpenAiProvider {
    pub fn new(api_key: ApiCredential, default_model: impl Into<String>) -> Self {
        Self {
            api_key,
            default_model: default_model.into(),
            base_url: "https://api.openai.com".to_string(),
            client: reqwest::Client::new(),
            last_usage: Arc::new(Mutex::new(TokenUsage::default())),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn request<'a>(
        &'a self,
        messages: &'a [Message],
        options: &'a CallOptions,
        stream: bool,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: options.model.as_deref().unwrap_or(&self.default_model),
            messages: messages
                .iter()
                .map(|m| WireMessage { role: m.role.as_str(), content: &m.content })
                .collect(),
            max_completion_tokens: options.max_tokens,
            temperature: options.temperature,
            stream,
            stream_options: stream.then_some(StreamOptions { include_usage: true }),
        }
    }

    async fn post(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose())
            .json(request)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;
        ensure_success(response).await
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn last_usage(&self) -> TokenUsage {
        *self.last_usage.lock()
    }

    async fn generate(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> Result<(String, TokenUsage), ProviderError> {
        let request = self.request(messages, options, false);
        let response = self.post(&request).await?;
        let body: ChatResponse =
            response.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        let usage = body.usage.as_ref().map(TokenUsage::from).unwrap_or_default();
        *self.last_usage.lock() = usage;
        Ok((content, usage))
    }

    async fn stream(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> Result<TextStream, ProviderError> {
        let request = self.request(messages, options, true);
        let response = self.post(&request).await?;

        *self.last_usage.lock() = TokenUsage::default();
        let usage_slot = Arc::clone(&self.last_usage);

        let stream = async_stream::try_stream! {
            let mut body = Box::pin(lines(response));
            while let Some(line) = body.next().await {
                let line = line?;
                let Some(payload) = sse_data(&line) else { continue };
                if payload == "[DONE]" {
                    break;
                }
                let chunk: ChatChunk = serde_json::from_str(payload)
                    .map_err(|e| ProviderError::Parse(e.to_string()))?;
                if let Some(usage) = &chunk.usage {
                    *usage_slot.lock() = usage.into();
                }
                if let Some(delta) = chunk.choices.into_iter().next().and_then(|c| c.delta.content) {
                    if !delta.is_empty() {
                        yield delta;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}
