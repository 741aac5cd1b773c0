//! The `mars show` command: view a completed debate.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use mars_runtime::output::reader::{
    count_rounds, extract_prompt_from_dirname, extract_timestamp, parse_costs_total,
    parse_providers, read_file,
};

use super::resolve_debate;

#[derive(Args)]
pub struct ShowArgs {
    #[command(subcommand)]
    section: Option<ShowSection>,

    /// Path to a specific debate directory
    #[arg(long, global = true)]
    debate: Option<String>,

    /// Output directory
    #[arg(short, long, default_value = "./mars-output", global = true)]
    output_dir: String,
}

#[derive(Subcommand)]
enum ShowSection {
    /// Show only the final synthesized answer
    Answer,
    /// Show token usage and cost breakdown
    Costs,
    /// Show per-provider contribution and influence metrics
    Attribution,
    /// Show round-by-round responses and diffs
    Rounds,
}

fn panel(title: &str, content: &str) {
    println!("\n{}", title.bold());
    println!("{}", "─".repeat(60));
    println!("{content}");
}

fn show_summary(debate_dir: &Path) -> Result<()> {
    let dirname = debate_dir
        .file_name()
        .and_then(|n| n.to_str())
        .context("invalid debate directory name")?;

    panel(
        "MARS Debate Summary",
        &format!(
            "{}\n\nTimestamp:  {}\nProviders:  {}\nRounds:     {}",
            extract_prompt_from_dirname(dirname),
            extract_timestamp(dirname),
            match parse_providers(debate_dir) {
                p if p.is_empty() => "unknown".to_string(),
                p => p.join(", "),
            },
            count_rounds(debate_dir),
        ),
    );

    if let Some(costs) = read_file(debate_dir, "audit/costs.md") {
        println!("\n{} {}", "Cost:".bold(), parse_costs_total(&costs));
    }
    if let Some(attribution) = read_file(debate_dir, "audit/attribution.md") {
        panel("Attribution", &attribution);
    }
    match read_file(debate_dir, "final-answer.md") {
        Some(answer) => panel("Final Answer", &answer),
        None => println!("\n{}", "No final answer yet (debate may be incomplete).".yellow()),
    }
    Ok(())
}

fn show_file(debate_dir: &Path, filename: &str, missing: &str) -> Result<()> {
    match read_file(debate_dir, filename) {
        Some(content) => {
            println!("{content}");
            Ok(())
        }
        None => bail!("{missing}"),
    }
}

fn show_rounds(debate_dir: &Path) -> Result<()> {
    let audit = debate_dir.join("audit");
    if !audit.is_dir() {
        bail!("No audit directory found.");
    }
    let mut round_files: Vec<_> = fs::read_dir(&audit)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains("round") && n.chars().next().is_some_and(|c| c.is_ascii_digit()))
        })
        .collect();
    if round_files.is_empty() {
        bail!("No round files found.");
    }
    round_files.sort();

    for path in round_files {
        let content = fs::read_to_string(&path)?;
        let label = path.file_stem().and_then(|s| s.to_str()).unwrap_or("round");
        panel(label, &content);
    }

    if let Some(diffs) = read_file(debate_dir, "audit/round-diffs.md") {
        panel("Round Diffs", &diffs);
    }
    Ok(())
}

pub fn run(args: ShowArgs) -> Result<()> {
    let debate_dir = resolve_debate(args.debate.as_deref(), &args.output_dir)?;
    match args.section {
        None => show_summary(&debate_dir),
        Some(ShowSection::Answer) => show_file(
            &debate_dir,
            "final-answer.md",
            "No final answer found (debate may be incomplete).",
        ),
        Some(ShowSection::Costs) => {
            show_file(&debate_dir, "audit/costs.md", "No cost data found.")
        }
        Some(ShowSection::Attribution) => {
            show_file(&debate_dir, "audit/attribution.md", "No attribution data found.")
        }
        Some(ShowSection::Rounds) => show_rounds(&debate_dir),
    }
}
