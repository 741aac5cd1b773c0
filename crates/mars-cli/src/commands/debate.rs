//! The `mars debate` command.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};
use clap::Args;

use mars_core::{provider_base_name, DebateConfig, DebateMode, Verbosity};
use mars_runtime::config::AppConfig;
use mars_runtime::providers::registry::{is_known_provider, AVAILABLE_PROVIDERS};
use mars_runtime::DebateEngine;

use super::resolve_value;

#[derive(Args)]
pub struct DebateArgs {
    /// The question or task to debate; @file reads it from a file
    prompt: String,

    /// Context text or @file path (repeatable)
    #[arg(short, long)]
    context: Vec<String>,

    /// Provider or provider:model, e.g. openai:gpt-4.1 (repeatable)
    #[arg(short, long = "provider")]
    provider: Vec<String>,

    /// Debate mode: round-robin or judge
    #[arg(short, long, default_value = "round-robin")]
    mode: String,

    /// Maximum debate rounds
    #[arg(short, long, default_value_t = 3)]
    rounds: u32,

    /// Provider to act as judge (judge mode)
    #[arg(short = 'j', long)]
    judge_provider: Option<String>,

    /// Provider for the final synthesis (default: auto)
    #[arg(short = 's', long)]
    synthesis_provider: Option<String>,

    /// Provider:model override, e.g. openai:gpt-4o-mini (repeatable)
    #[arg(long = "model")]
    model: Vec<String>,

    /// Convergence similarity threshold (0.0-1.0)
    #[arg(long, default_value_t = 0.85)]
    threshold: f64,

    /// Max output tokens per LLM call
    #[arg(long, default_value_t = 8192)]
    max_tokens: u32,

    /// Temperature (0.0-2.0); default: provider default
    #[arg(short = 't', long)]
    temperature: Option<f32>,

    /// Retries per provider call after a transient failure
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Stream responses in real time
    #[arg(short, long)]
    verbose: bool,

    /// Output directory
    #[arg(short, long, default_value = "./mars-output")]
    output_dir: String,
}

/// Split participant entries into IDs and model overrides.
///
/// `"openai:gpt-4.1"` keeps the full string as the participant ID and
/// registers the suffix as that participant's model.
fn parse_participants(raw: &[String]) -> (Vec<String>, BTreeMap<String, String>) {
    let mut providers = Vec::new();
    let mut overrides = BTreeMap::new();
    for entry in raw {
        if let Some((_, model)) = entry.split_once(':') {
            overrides.insert(entry.clone(), model.to_string());
        }
        providers.push(entry.clone());
    }
    (providers, overrides)
}

pub async fn run(args: DebateArgs) -> Result<()> {
    let app_config = AppConfig::load();

    let prompt = resolve_value(&args.prompt)?;
    let context =
        args.context.iter().map(|c| resolve_value(c)).collect::<Result<Vec<String>>>()?;

    let raw_providers = if args.provider.is_empty() {
        app_config.default_providers()
    } else {
        args.provider.clone()
    };
    let (providers, mut model_overrides) = parse_participants(&raw_providers);

    for participant in &providers {
        let base = provider_base_name(participant);
        if !is_known_provider(base) {
            bail!(
                "Unknown provider '{base}'. Available: {}",
                AVAILABLE_PROVIDERS.join(", ")
            );
        }
    }

    // Explicit --model overrides match by base name against the
    // selected participants.
    for entry in &args.model {
        let Some((base, model)) = entry.split_once(':') else {
            bail!("Invalid --model format '{entry}'. Expected provider:model.");
        };
        let mut matched = false;
        for participant in &providers {
            if provider_base_name(participant) == base {
                model_overrides.insert(participant.clone(), model.to_string());
                matched = true;
            }
        }
        if !matched {
            model_overrides.insert(base.to_string(), model.to_string());
        }
    }

    let mode: DebateMode = args.mode.parse().map_err(|e: String| anyhow!(e))?;

    let config = DebateConfig {
        prompt,
        context,
        providers,
        model_overrides,
        mode,
        rounds: args.rounds,
        judge_provider: args.judge_provider,
        synthesis_provider: args.synthesis_provider,
        threshold: args.threshold,
        max_tokens: args.max_tokens,
        temperature: args.temperature,
        max_retries: args.max_retries,
        output_dir: args.output_dir,
        verbosity: if args.verbose { Verbosity::Verbose } else { Verbosity::Quiet },
    };
    config.validate()?;

    DebateEngine::new(config, app_config).run().await?;
    Ok(())
}
