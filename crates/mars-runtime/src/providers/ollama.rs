//! Ollama provider (local models over HTTP).
//!
//! Ollama streams JSON lines rather than SSE; the final line carries
//! `done: true` plus token counts. Costs stay at zero since the
//! models run locally.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use mars_core::{Message, TokenUsage};

use super::sse::{ensure_success, lines};
use super::{CallOptions, LlmProvider, ProviderError, TextStream};
use futures::StreamExt;

// Local models can be slow to load on first call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Ollama chat request format.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Ollama chat response; streamed lines share this shape.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// Ollama provider.
pub struct OllamaProvider {
    base_url: String,
    default_model: String,
    client: reqwest::Client,
    last_usage: Arc<Mutex<TokenUsage>>,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: default_model.into(),
            client: reqwest::Client::new(),
            last_usage: Arc::new(Mutex::new(TokenUsage::default())),
        }
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
            stream,
            options: ChatOptions {
                num_predict: options.max_tokens,
                temperature: options.temperature,
            },
        }
    }

    async fn post(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(REQUEST_TIMEOUT)
            .json(request)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;
        ensure_success(response).await
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
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

        let usage = TokenUsage::new(body.prompt_eval_count, body.eval_count);
        *self.last_usage.lock() = usage;
        Ok((body.message.map(|m| m.content).unwrap_or_default(), usage))
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
                if line.is_empty() {
                    continue;
                }
                let chunk: ChatResponse = serde_json::from_str(&line)
                    .map_err(|e| ProviderError::Parse(e.to_string()))?;
                if chunk.done {
                    *usage_slot.lock() =
                        TokenUsage::new(chunk.prompt_eval_count, chunk.eval_count);
                }
                if let Some(message) = chunk.message {
                    if !message.content.is_empty() {
                        yield message.content;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_stripped() {
        let provider = OllamaProvider::new("http://localhost:11434/", "llama3.2");
        assert_eq!(provider.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_request_shape() {
        let provider = OllamaProvider::new("http://localhost:11434", "llama3.2");
        let messages = [Message::user("hello there")];
        let options = CallOptions::new(None, 2048, None);
        let json = serde_json::to_value(provider.request(&messages, &options, true)).unwrap();

        assert_eq!(json["model"], "llama3.2");
        assert_eq!(json["stream"], true);
        assert_eq!(json["options"]["num_predict"], 2048);
        assert!(json["options"].get("temperature").is_none());
    }

    #[test]
    fn test_final_line_carries_usage() {
        let chunk: ChatResponse = serde_json::from_str(
            r#"{"message":{"content":""},"done":true,"prompt_eval_count":9,"eval_count":21}"#,
        )
        .unwrap();
        assert!(chunk.done);
        assert_eq!(chunk.prompt_eval_count, 9);
        assert_eq!(chunk.eval_count, 21);
    }
}
