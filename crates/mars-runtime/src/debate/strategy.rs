//! Shared state and operations for debate strategies.
//!
//! The two strategies differ only in `run()`; everything they share
//! (providers, config, renderer, writer, dispatch and fan-out rules)
//! lives in [`DebateContext`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use futures::StreamExt;

use mars_core::{DebateConfig, DebateResult, LlmResponse, Message};

use super::DebateError;
use crate::display::Renderer;
use crate::output::OutputWriter;
use crate::providers::retry::{retry_with_backoff, sanitize_log_message};
use crate::providers::{CallOptions, LlmProvider, ProviderError};

/// A registered participant: its ID plus the provider behind it.
pub struct ProviderHandle {
    /// Participant ID (`"openai"` or `"openai:gpt-4.1"`).
    pub id: String,
    pub provider: Arc<dyn LlmProvider>,
}

/// A debate strategy drives the rounds and produces the final answer.
#[async_trait]
pub trait DebateStrategy {
    async fn run(&self) -> Result<DebateResult, DebateError>;
}

/// State shared by all strategies.
pub struct DebateContext {
    /// Participants in registration order; the order is significant
    /// for synthesis fallback and verbose streaming.
    pub providers: Vec<ProviderHandle>,
    pub config: DebateConfig,
    pub renderer: Arc<Renderer>,
    pub writer: Arc<OutputWriter>,
}

impl DebateContext {
    /// Look up a participant by ID.
    pub fn handle(&self, id: &str) -> Option<&ProviderHandle> {
        self.providers.iter().find(|h| h.id == id)
    }

    fn call_options(&self, id: &str) -> CallOptions {
        CallOptions::new(
            self.config.model_override(id).map(str::to_string),
            self.config.max_tokens,
            self.config.temperature,
        )
    }

    /// Concrete model a participant resolves to.
    pub fn resolved_model(&self, handle: &ProviderHandle) -> String {
        self.config
            .model_override(&handle.id)
            .map(str::to_string)
            .unwrap_or_else(|| handle.provider.default_model().to_string())
    }

    /// One provider call with verbose/quiet handling and retry.
    ///
    /// Quiet mode retries the whole `generate`; verbose mode retries
    /// only stream acquisition. Once a chunk has been delivered, a
    /// mid-stream failure is fatal for the call.
    pub async fn dispatch(
        &self,
        handle: &ProviderHandle,
        messages: &[Message],
    ) -> Result<LlmResponse, ProviderError> {
        let options = self.call_options(&handle.id);
        let verbose = self.config.verbosity == mars_core::Verbosity::Verbose;

        let (content, usage) = if verbose {
            self.renderer.start_provider_stream(&handle.id);
            let mut stream = retry_with_backoff(self.config.max_retries, || {
                handle.provider.stream(messages, &options)
            })
            .await?;

            let mut content = String::new();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                self.renderer.stream_chunk(&chunk);
                content.push_str(&chunk);
            }
            self.renderer.end_provider_stream();
            (content, handle.provider.last_usage())
        } else {
            let (content, usage) = retry_with_backoff(self.config.max_retries, || {
                handle.provider.generate(messages, &options)
            })
            .await?;
            self.renderer.show_response(&handle.id, &content);
            (content, usage)
        };

        Ok(LlmResponse {
            provider: handle.id.clone(),
            model: self.resolved_model(handle),
            content,
            usage,
        })
    }

    /// Fan a prompt out to several participants.
    ///
    /// Quiet mode dispatches in parallel behind one spinner; verbose
    /// mode runs sequentially so streams never interleave. Failed
    /// providers are logged through the renderer and omitted; their
    /// errors are returned alongside the successes.
    pub async fn gather(
        &self,
        items: Vec<(&ProviderHandle, Vec<Message>)>,
        phase: &str,
    ) -> (Vec<LlmResponse>, Vec<(String, ProviderError)>) {
        let mut responses = Vec::new();
        let mut failures = Vec::new();

        if self.config.verbosity == mars_core::Verbosity::Verbose {
            for (handle, messages) in items {
                match self.dispatch(handle, &messages).await {
                    Ok(response) => responses.push(response),
                    Err(err) => {
                        self.renderer.show_error(&handle.id, &sanitize_log_message(&err));
                        failures.push((handle.id.clone(), err));
                    }
                }
            }
        } else {
            let names: Vec<String> = items.iter().map(|(h, _)| h.id.clone()).collect();
            self.renderer.start_work(&names, phase);
            let results = join_all(
                items
                    .into_iter()
                    .map(|(handle, messages)| async move {
                        (handle.id.clone(), self.dispatch(handle, &messages).await)
                    }),
            )
            .await;
            self.renderer.stop_work();

            for (id, outcome) in results {
                match outcome {
                    Ok(response) => responses.push(response),
                    Err(err) => {
                        self.renderer.show_error(&id, &sanitize_log_message(&err));
                        failures.push((id, err));
                    }
                }
            }
        }

        (responses, failures)
    }
}
