//! Judge strategy: one initial round, then a designated evaluator
//! rules on all answers. No fallback: a failed judge fails the run.

use async_trait::async_trait;

use mars_core::{ConfigError, DebateResult, DebateRound, LlmResponse, Message};

use super::prompts;
use super::strategy::{DebateContext, DebateStrategy, ProviderHandle};
use super::DebateError;

pub struct JudgeStrategy {
    ctx: DebateContext,
}

impl JudgeStrategy {
    pub fn new(ctx: DebateContext) -> Self {
        Self { ctx }
    }

    fn initial_items(&self) -> Vec<(&ProviderHandle, Vec<Message>)> {
        let messages = prompts::initial_messages(&self.ctx.config.prompt, &self.ctx.config.context);
        self.ctx.providers.iter().map(|h| (h, messages.clone())).collect()
    }

    async fn judge(
        &self,
        judge: &ProviderHandle,
        responses: &[LlmResponse],
    ) -> Result<LlmResponse, DebateError> {
        let answers: Vec<&LlmResponse> = responses.iter().collect();
        let messages =
            prompts::judge_messages(&self.ctx.config.prompt, &self.ctx.config.context, &answers);

        self.ctx.renderer.start_work(&[judge.id.clone()], "Judging");
        let outcome = self.ctx.dispatch(judge, &messages).await;
        self.ctx.renderer.stop_work();
        outcome.map_err(|source| DebateError::JudgeFailed { source })
    }
}

#[async_trait]
impl DebateStrategy for JudgeStrategy {
    async fn run(&self) -> Result<DebateResult, DebateError> {
        let config = &self.ctx.config;
        let mut result = DebateResult::new(&config.prompt, config.context.clone(), config.mode);

        self.ctx.writer.write_prompt(&config.prompt, &config.context)?;

        let judge_id = config
            .judge_provider
            .clone()
            .ok_or(DebateError::Config(ConfigError::MissingJudge))?;
        let judge = self
            .ctx
            .handle(&judge_id)
            .ok_or_else(|| DebateError::Config(ConfigError::JudgeNotSelected(judge_id.clone())))?;

        self.ctx.renderer.start_round(1);
        let (responses, failures) = self.ctx.gather(self.initial_items(), "Round 1").await;
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

        let mut round = DebateRound::new(1);
        round.responses = responses.clone();
        result.rounds.push(round);

        let judgment = self.judge(judge, &responses).await?;
        let (final_answer, resolution) = prompts::split_final_answer(&judgment.content);

        let reason = format!("Judge ({judge_id}) evaluated all responses.");
        self.ctx.renderer.show_convergence(&reason);
        self.ctx.writer.write_convergence(&reason)?;
        self.ctx.writer.write_resolution(&resolution)?;
        self.ctx.writer.write_final(&final_answer)?;

        result.synthesis = Some(judgment);
        result.final_answer = final_answer;
        result.resolution = resolution;
        result.convergence_reason = reason;

        Ok(result)
    }
}
