//! LLM provider abstraction.
//!
//! One trait, [`LlmProvider`], covers every back-end: a blocking
//! `generate` and a lazily-consumed `stream`, both taking the same
//! message list and call options. Vendor implementations translate to
//! their own wire protocols; nothing vendor-specific leaks past this
//! module.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;

use mars_core::{Message, TokenUsage};

mod anthropic;
mod google;
mod ollama;
mod openai;
pub mod registry;
pub mod retry;
pub mod secrets;
mod sse;

pub use anthropic::AnthropicProvider;
pub use google::GoogleProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use secrets::{ApiCredential, CredentialSource};

/// Errors from LLM providers.
///
/// The rendered messages matter: the retry layer classifies
/// transient failures by substring, so timeout and connection
/// failures must say so.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("rate_limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("stream interrupted: {0}")]
    Stream(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Map a reqwest error, preserving the markers the transient
    /// classifier looks for.
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Http(format!("request timeout: {err}"))
        } else if err.is_connect() {
            Self::Http(format!("connection failed: {err}"))
        } else {
            Self::Http(err.to_string())
        }
    }
}

/// Per-call options shared by every provider.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Overrides the provider's default model when set.
    pub model: Option<String>,
    pub max_tokens: u32,
    /// When `None`, no temperature field is transmitted; the vendor's
    /// own default applies.
    pub temperature: Option<f32>,
}

impl CallOptions {
    pub fn new(model: Option<String>, max_tokens: u32, temperature: Option<f32>) -> Self {
        Self { model, max_tokens, temperature }
    }
}

/// A lazy, finite sequence of text chunks from a streaming call.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Uniform contract over one model back-end.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stable provider identifier (`"openai"`, `"anthropic"`, ...).
    fn name(&self) -> &str;

    /// Model used when the call options carry no override.
    fn default_model(&self) -> &str;

    /// Usage for the most recent fully drained stream.
    ///
    /// Only valid after the stream has been consumed to completion;
    /// until then it reports zeros.
    fn last_usage(&self) -> TokenUsage;

    /// Generate a complete response.
    async fn generate(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> Result<(String, TokenUsage), ProviderError>;

    /// Stream a response chunk by chunk.
    ///
    /// Chunks arrive in order and their concatenation equals what
    /// `generate` would have returned for the same inputs. Usage
    /// becomes queryable through [`LlmProvider::last_usage`] once the
    /// stream is fully drained.
    async fn stream(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> Result<TextStream, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_classifiable_message() {
        // Construction goes through from_reqwest in the providers; the
        // message contract is what the retry layer depends on.
        let err = ProviderError::Http("request timeout: deadline elapsed".to_string());
        assert!(err.to_string().contains("timeout"));

        let err = ProviderError::RateLimited { retry_after: None };
        assert!(err.to_string().contains("rate_limit"));
    }
}
