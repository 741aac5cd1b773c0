//! Anthropic messages-API provider.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use mars_core::{Message, Role, TokenUsage};

use super::sse::{ensure_success, lines, sse_data};
use super::{ApiCredential, CallOptions, LlmProvider, ProviderError, TextStream};
use futures::StreamExt;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic API request format.
///
/// The messages API takes the system prompt as a top-level field, not
/// as a message.
#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Anthropic API response format.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Streaming events, keyed by their `type` tag. Unknown events
/// (`ping`, `content_block_start`, ...) are ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum StreamEvent {
    #[serde(rename = "message_start")]
    MessageStart { message: StartMessage },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: BlockDelta },
    #[serde(rename = "message_delta")]
    MessageDelta { usage: WireUsage },
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StartMessage {
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct BlockDelta {
    text: Option<String>,
}

/// Anthropic provider.
pub struct AnthropicProvider {
    api_key: ApiCredential,
    default_model: String,
    base_url: String,
    client: reqwest::Client,
    last_usage: Arc<Mutex<TokenUsage>>,
}

impl AnthropicProvider {
    pub fn new(api_key: ApiCredential, default_model: impl Into<String>) -> Self {
        Self {
            api_key,
            default_model: default_model.into(),
            base_url: "https://api.anthropic.com".to_string(),
            client: reqwest::Client::new(),
            last_usage: Arc::new(Mutex::new(TokenUsage::default())),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Split out the system prompt; the messages API wants it
    /// top-level.
    fn split_system(messages: &[Message]) -> (Option<&str>, Vec<WireMessage<'_>>) {
        let mut system = None;
        let mut rest = Vec::new();
        for m in messages {
            match m.role {
                Role::System => system = Some(m.content.as_str()),
                role => rest.push(WireMessage { role: role.as_str(), content: &m.content }),
            }
        }
        (system, rest)
    }

    fn request<'a>(
        &'a self,
        messages: &'a [Message],
        options: &'a CallOptions,
        stream: bool,
    ) -> MessagesRequest<'a> {
        let (system, wire_messages) = Self::split_system(messages);
        MessagesRequest {
            model: options.model.as_deref().unwrap_or(&self.default_model),
            max_tokens: options.max_tokens,
            system,
            messages: wire_messages,
            temperature: options.temperature,
            stream,
        }
    }

    async fn post(
        &self,
        request: &MessagesRequest<'_>,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;
        ensure_success(response).await
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
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
        let body: MessagesResponse =
            response.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;

        let content = body
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        let usage = TokenUsage::new(body.usage.input_tokens, body.usage.output_tokens);
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
                let event: StreamEvent = serde_json::from_str(payload)
                    .map_err(|e| ProviderError::Parse(e.to_string()))?;
                match event {
                    StreamEvent::MessageStart { message } => {
                        usage_slot.lock().input_tokens = message.usage.input_tokens;
                    }
                    StreamEvent::ContentBlockDelta { delta } => {
                        if let Some(text) = delta.text {
                            if !text.is_empty() {
                                yield text;
                            }
                        }
                    }
                    StreamEvent::MessageDelta { usage } => {
                        usage_slot.lock().output_tokens = usage.output_tokens;
                    }
                    StreamEvent::MessageStop => break,
                    StreamEvent::Other => {}
                }
            }
        };
        Ok(Box::pin(stream))
    }
}
