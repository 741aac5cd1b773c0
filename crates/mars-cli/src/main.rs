//! MARS - Multi-Agent Resolution Synthesis.
//!
//! # Usage
//!
//! ```bash
//! # Run a debate between two providers
//! mars debate "Is Python better than Rust?" -p openai -p anthropic
//!
//! # Judge mode with streamed output
//! mars debate "Compare SQL vs NoSQL" -p openai -p google -m judge -j openai -v
//!
//! # Inspect past debates
//! mars show
//! mars history
//! mars copy
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{configure, copy, debate, history, providers, show};

/// MARS - Multi-Agent Resolution Synthesis.
///
/// Multiple LLMs debate a prompt, critique each other's answers, and
/// converge on a synthesized best answer.
#[derive(Parser)]
#[command(
    name = "mars",
    version,
    about = "MARS - Multi-Agent Resolution Synthesis",
    long_about = "Multiple LLMs debate a prompt, critique each other's answers,\n\
                  and converge on a synthesized best answer. Supports round-robin\n\
                  (iterative critique) and judge (single evaluator) modes."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a multi-LLM debate on a prompt
    Debate(debate::DebateArgs),

    /// List available providers and their configuration status
    Providers,

    /// Interactively configure provider API keys
    Configure,

    /// View results of a completed debate
    Show(show::ShowArgs),

    /// List past debates
    History(history::HistoryArgs),

    /// Copy the final answer to the clipboard
    Copy(copy::CopyArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    let cli = Cli::parse();
    match cli.command {
        Commands::Debate(args) => debate::run(args).await,
        Commands::Providers => providers::run(),
        Commands::Configure => configure::run(),
        Commands::Show(args) => show::run(args),
        Commands::History(args) => history::run(args),
        Commands::Copy(args) => copy::run(args),
    }
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}
