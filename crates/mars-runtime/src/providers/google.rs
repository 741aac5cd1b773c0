//! Google Gemini provider.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use mars_core::{Message, Role, TokenUsage};

use super::sse::{ensure_success, lines, sse_data};
use super::{ApiCredential, CallOptions, LlmProvider, ProviderError, TextStream};
use futures::StreamExt;

/// Gemini generateContent request format.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ContentPayload<'a>>,
    contents: Vec<WireContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct WireContent<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct ContentPayload<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Gemini response format; streamed chunks share this shape.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

impl From<&UsageMetadata> for TokenUsage {
    fn from(meta: &UsageMetadata) -> Self {
        TokenUsage::new(meta.prompt_token_count, meta.candidates_token_count)
    }
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

/// Google Gemini provider.
pub struct GoogleProvider {
    api_key: ApiCredential,
    default_model: String,
    base_url: String,
    client: reqwest::Client,
    last_usage: Arc<Mutex<TokenUsage>>,
}

impl GoogleProvider {
    pub fn new(api_key: ApiCredential, default_model: impl Into<String>) -> Self {
        Self {
            api_key,
            default_model: default_model.into(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            client: reqwest::Client::new(),
            last_usage: Arc::new(Mutex::new(TokenUsage::default())),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Gemini has no system role and calls the assistant "model".
    fn build_request<'a>(
        messages: &'a [Message],
        options: &CallOptions,
    ) -> GenerateRequest<'a> {
        let mut system_instruction = None;
        let mut contents = Vec::new();
        for m in messages {
            match m.role {
                Role::System => {
                    system_instruction =
                        Some(ContentPayload { parts: vec![Part { text: &m.content }] });
                }
                Role::Assistant => {
                    contents.push(WireContent {
                        role: "model",
                        parts: vec![Part { text: &m.content }],
                    });
                }
                Role::User => {
                    contents.push(WireContent {
                        role: "user",
                        parts: vec![Part { text: &m.content }],
                    });
                }
            }
        }
        GenerateRequest {
            system_instruction,
            contents,
            generation_config: GenerationConfig {
                max_output_tokens: options.max_tokens,
                temperature: options.temperature,
            },
        }
    }

    async fn post(
        &self,
        endpoint: &str,
        model: &str,
        request: &GenerateRequest<'_>,
        sse: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut url = format!("{}/v1beta/models/{}:{}", self.base_url, model, endpoint);
        if sse {
            url.push_str("?alt=sse");
        }
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", self.api_key.expose())
            .json(request)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;
        ensure_success(response).await
    }
}

#[async_trait]
impl LlmProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
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
        let model = options.model.as_deref().unwrap_or(&self.default_model);
        let request = Self::build_request(messages, options);
        let response = self.post("generateContent", model, &request, false).await?;
        let body: GenerateResponse =
            response.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;

        let usage = body.usage_metadata.as_ref().map(TokenUsage::from).unwrap_or_default();
        *self.last_usage.lock() = usage;
        Ok((body.text(), usage))
    }

    async fn stream(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> Result<TextStream, ProviderError> {
        let model = options.model.as_deref().unwrap_or(&self.default_model);
        let request = Self::build_request(messages, options);
        let response = self.post("streamGenerateContent", model, &request, true).await?;

        *self.last_usage.lock() = TokenUsage::default();
        let usage_slot = Arc::clone(&self.last_usage);

        let stream = async_stream::try_stream! {
            let mut body = Box::pin(lines(response));
            while let Some(line) = body.next().await {
                let line = line?;
                let Some(payload) = sse_data(&line) else { continue };
                let chunk: GenerateResponse = serde_json::from_str(payload)
                    .map_err(|e| ProviderError::Parse(e.to_string()))?;
                if let Some(meta) = &chunk.usage_metadata {
                    *usage_slot.lock() = meta.into();
                }
                let text = chunk.text();
                if !text.is_empty() {
                    yield text;
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
    fn test_role_mapping_and_system_instruction() {
        let messages = [
            Message::system("stay factual"),
            Message::user("why is the sky blue?"),
            Message::assistant("scattering"),
        ];
        let options = CallOptions::new(None, 512, Some(0.2));
        let json = serde_json::to_value(GoogleProvider::build_request(&messages, &options)).unwrap();

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "stay factual");
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 512);
        assert_eq!(json["generationConfig"]["temperature"], 0.2);
    }

    #[test]
    fn test_temperature_absent_when_unset() {
        let messages = [Message::user("hello")];
        let options = CallOptions::new(None, 512, None);
        let json = serde_json::to_value(GoogleProvider::build_request(&messages, &options)).unwrap();
        assert!(json["generationConfig"].get("temperature").is_none());
    }

    #[test]
    fn test_response_text_joins_parts() {
        let body: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"a"},{"text":"b"}]}}],
                "usageMetadata":{"promptTokenCount":7,"candidatesTokenCount":3}}"#,
        )
        .unwrap();
        assert_eq!(body.text(), "ab");
        assert_eq!(TokenUsage::from(body.usage_metadata.as_ref().unwrap()).input_tokens, 7);
    }

    #[test]
    fn test_empty_candidates() {
        let body: GenerateResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(body.text(), "");
    }
}
