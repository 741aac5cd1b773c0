//! Top-level debate engine: provider construction, strategy
//! selection, and post-run analysis.

use std::sync::Arc;

use mars_core::{compute_costs, AttributionAnalyzer, DebateConfig, DebateMode, DebateResult};

use super::strategy::{DebateContext, DebateStrategy, ProviderHandle};
use super::{DebateError, JudgeStrategy, RoundRobinStrategy};
use crate::config::AppConfig;
use crate::display::Renderer;
use crate::output::OutputWriter;
use crate::providers::registry::create_provider;

pub struct DebateEngine {
    config: DebateConfig,
    app_config: AppConfig,
}

impl DebateEngine {
    pub fn new(config: DebateConfig, app_config: AppConfig) -> Self {
        Self { config, app_config }
    }

    /// Run the debate end to end: validate, execute the strategy, then
    /// derive and emit attribution and cost reports.
    pub async fn run(&self) -> Result<DebateResult, DebateError> {
        self.config.validate()?;

        let mut providers = Vec::with_capacity(self.config.providers.len());
        for participant in &self.config.providers {
            providers.push(ProviderHandle {
                id: participant.clone(),
                provider: create_provider(participant, &self.app_config)?,
            });
        }

        let renderer = Arc::new(Renderer::new(self.config.verbosity));
        let writer = Arc::new(OutputWriter::new(&self.config.output_dir, &self.config.prompt)?);

        renderer.start_debate(
            &self.config.prompt,
            &self.config.providers,
            &self.config.mode.to_string(),
        );

        let ctx = DebateContext {
            providers,
            config: self.config.clone(),
            renderer: Arc::clone(&renderer),
            writer: Arc::clone(&writer),
        };

        let strategy: Box<dyn DebateStrategy> = match self.config.mode {
            DebateMode::Judge => Box::new(JudgeStrategy::new(ctx)),
            DebateMode::RoundRobin => Box::new(RoundRobinStrategy::new(ctx)),
        };
        let result = strategy.run().await?;

        // Post-debate analysis is pure computation over the result.
        let attribution = AttributionAnalyzer::new().analyze(&result);
        let costs = compute_costs(&result);

        renderer.show_attribution(&attribution);
        renderer.show_round_diffs(&attribution.round_diffs);
        renderer.show_costs(&costs);
        writer.write_attribution(&attribution)?;
        writer.write_round_diffs(&attribution.round_diffs)?;
        writer.write_costs(&costs)?;

        renderer.show_final_answer(&result);
        renderer.show_output_path(&writer.base_path().display().to_string());

        Ok(result)
    }
}
