//! Round-robin strategy: iterative critique with convergence
//! detection and fallback synthesis.

use std::collections::HashMap;

use async_trait::async_trait;

use mars_core::similarity;
use mars_core::{provider_base_name, Critique, DebateResult, DebateRound, LlmResponse, Message};

use super::prompts;
use super::strategy::{DebateContext, DebateStrategy, ProviderHandle};
use super::DebateError;
use crate::providers::retry::sanitize_log_message;

pub struct RoundRobinStrategy {
    ctx: DebateContext,
}

impl RoundRobinStrategy {
    pub fn new(ctx: DebateContext) -> Self {
        Self { ctx }
    }

    fn initial_items(&self) -> Vec<(&ProviderHandle, Vec<Message>)> {
        let messages = prompts::initial_messages(&self.ctx.config.prompt, &self.ctx.config.context);
        self.ctx.providers.iter().map(|h| (h, messages.clone())).collect()
    }

    /// Critique items for every participant still present, each seeing
    /// its own previous answer plus all peers'.
    fn critique_items(
        &self,
        latest: &HashMap<String, LlmResponse>,
    ) -> Vec<(&ProviderHandle, Vec<Message>)> {
        let mut items = Vec::new();
        for handle in &self.ctx.providers {
            let Some(own) = latest.get(&handle.id) else { continue };
            let others: Vec<&LlmResponse> = self
                .ctx
                .providers
                .iter()
                .filter(|other| other.id != handle.id)
                .filter_map(|other| latest.get(&other.id))
                .collect();
            if others.is_empty() {
                continue;
            }
            let messages = prompts::critique_messages(
                &self.ctx.config.prompt,
                &self.ctx.config.context,
                own,
                &others,
            );
            items.push((handle, messages));
        }
        items
    }

    /// Critique records: each responding author critiqued every peer
    /// present in the previous round.
    fn critiques_for(
        &self,
        responses: &[LlmResponse],
        latest: &HashMap<String, LlmResponse>,
    ) -> Vec<Critique> {
        let mut critiques = Vec::new();
        for response in responses {
            for handle in &self.ctx.providers {
                if handle.id != response.provider && latest.contains_key(&handle.id) {
                    critiques.push(Critique {
                        author: response.provider.clone(),
                        target: handle.id.clone(),
                        content: response.content.clone(),
                    });
                }
            }
        }
        critiques
    }

    /// Converged iff some provider is present in both rounds and every
    /// such provider's answers are at least `threshold` similar.
    fn has_converged(
        &self,
        previous: &HashMap<String, LlmResponse>,
        current: &[LlmResponse],
    ) -> bool {
        let mut any_common = false;
        for response in current {
            let Some(prev) = previous.get(&response.provider) else { continue };
            any_common = true;
            if similarity::ratio(&prev.content, &response.content) < self.ctx.config.threshold {
                return false;
            }
        }
        any_common
    }

    /// Providers to try for synthesis, in order: the configured
    /// synthesis provider first if set, else anthropic then openai,
    /// then everything else in registration order.
    fn synthesis_order(&self) -> Vec<&ProviderHandle> {
        let mut ordered: Vec<&ProviderHandle> = Vec::new();

        if let Some(synth) = &self.ctx.config.synthesis_provider {
            if let Some(handle) = self.ctx.handle(synth) {
                ordered.push(handle);
            }
        } else {
            for preferred in ["anthropic", "openai"] {
                if let Some(handle) = self
                    .ctx
                    .providers
                    .iter()
                    .find(|h| provider_base_name(&h.id) == preferred)
                {
                    if !ordered.iter().any(|o| o.id == handle.id) {
                        ordered.push(handle);
                    }
                }
            }
        }

        for handle in &self.ctx.providers {
            if !ordered.iter().any(|o| o.id == handle.id) {
                ordered.push(handle);
            }
        }
        ordered
    }

    /// Try each synthesis candidate in order; the first success is
    /// canonical. Exhausting all candidates is a fatal run error
    /// carrying the last cause.
    async fn synthesize(
        &self,
        latest: &HashMap<String, LlmResponse>,
    ) -> Result<LlmResponse, DebateError> {
        let answers: Vec<&LlmResponse> = self
            .ctx
            .providers
            .iter()
            .filter_map(|h| latest.get(&h.id))
            .collect();
        let messages =
            prompts::synthesis_messages(&self.ctx.config.prompt, &self.ctx.config.context, &answers);

        self.ctx.renderer.start_round(0);
        let mut last_error: Option<String> = None;

        for handle in self.synthesis_order() {
            self.ctx.renderer.start_work(&[handle.id.clone()], "Synthesizing");
            match self.ctx.dispatch(handle, &messages).await {
                Ok(response) => {
                    self.ctx.renderer.stop_work();
                    return Ok(response);
                }
                Err(err) => {
                    self.ctx.renderer.stop_work();
                    let rendered = sanitize_log_message(&err);
                    self.ctx
                        .renderer
                        .show_error(&handle.id, &format!("Synthesis failed: {rendered}"));
                    tracing::warn!(provider = %handle.id, error = %rendered, "synthesis attempt failed");
                    last_error = Some(rendered);
                }
            }
        }

        Err(DebateError::SynthesisExhausted {
            cause: last_error.unwrap_or_else(|| "no providers available".to_string()),
        })
    }
}

#[async_trait]
impl DebateStrategy for RoundRobinStrategy {
    async fn run(&self) -> Result<DebateResult, DebateError> {
        let config = &self.ctx.config;
        let mut result = DebateResult::new(&config.prompt, config.context.clone(), config.mode);

        self.ctx.writer.write_prompt(&config.prompt, &config.context)?;

        let mut latest: HashMap<String, LlmResponse> = HashMap::new();

        for round_number in 1..=config.rounds {
            self.ctx.renderer.start_round(round_number);
            let mut round = DebateRound::new(round_number);

            if round_number == 1 {
                let (responses, failures) =
                    self.ctx.gather(self.initial_items(), "Round 1").await;
                if responses.is_empty() {
                    return Err(DebateError::RoundFailed {
                        round: 1,
                        cause: failures
                            .first()
                            .map(|(_, e)| e.to_string())
                            .unwrap_or_else(|| "no providers registered".to_string()),
                    });
                }
                self.ctx.writer.write_round(1, &responses, &[])?;
                for response in &responses {
                    latest.insert(response.provider.clone(), response.clone());
                }
                round.responses = responses;
                result.rounds.push(round);
            } else {
                let items = self.critique_items(&latest);
                if items.is_empty() {
                    // A lone surviving provider has no critique
                    // partners; go straight to synthesis.
                    break;
                }
                let phase = format!("Round {round_number} critiques");
                let (responses, failures) = self.ctx.gather(items, &phase).await;
                if responses.is_empty() {
                    return Err(DebateError::RoundFailed {
                        round: round_number,
                        cause: failures
                            .first()
                            .map(|(_, e)| e.to_string())
                            .unwrap_or_else(|| "no providers eligible for critique".to_string()),
                    });
                }
                let critiques = self.critiques_for(&responses, &latest);
                self.ctx.writer.write_round(round_number, &responses, &critiques)?;

                let converged = self.has_converged(&latest, &responses);
                for response in &responses {
                    latest.insert(response.provider.clone(), response.clone());
                }
                round.responses = responses;
                round.critiques = critiques;
                result.rounds.push(round);

                if converged {
                    let reason = format!(
                        "Answers converged after round {round_number} (similarity threshold {} reached).",
                        config.threshold
                    );
                    self.ctx.renderer.show_convergence(&reason);
                    self.ctx.writer.write_convergence(&reason)?;
                    result.convergence_reason = reason;
                    break;
                }
            }
        }

        if result.convergence_reason.is_empty() {
            let reason = format!("Maximum rounds ({}) reached.", config.rounds);
            self.ctx.renderer.show_convergence(&reason);
            self.ctx.writer.write_convergence(&reason)?;
            result.convergence_reason = reason;
        }

        let synthesis = self.synthesize(&latest).await?;
        let (final_answer, resolution) = prompts::split_final_answer(&synthesis.content);
        self.ctx.writer.write_resolution(&resolution)?;
        self.ctx.writer.write_final(&final_answer)?;

        result.synthesis = Some(synthesis);
        result.final_answer = final_answer;
        result.resolution = resolution;

        Ok(result)
    }
}
