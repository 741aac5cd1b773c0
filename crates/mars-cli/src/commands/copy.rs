//! The `mars copy` command: final answer to the clipboard.

use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use clap::Args;

use mars_runtime::output::reader::read_file;

use super::resolve_debate;

#[derive(Args)]
pub struct CopyArgs {
    /// Include prompt, answer, and attribution
    #[arg(long)]
    full: bool,

    /// Path to a specific debate directory
    #[arg(long)]
    debate: Option<String>,

    /// Output directory
    #[arg(short, long, default_value = "./mars-output")]
    output_dir: String,
}

/// Pipe text into the platform clipboard tool. Returns false when no
/// tool is available.
fn copy_to_clipboard(text: &str) -> bool {
    let candidates: &[(&str, &[&str])] = match std::env::consts::OS {
        "macos" => &[("pbcopy", &[])],
        "linux" => &[
            ("xclip", &["-selection", "clipboard"]),
            ("xsel", &["--clipboard", "--input"]),
        ],
        "windows" => &[("clip", &[])],
        _ => return false,
    };

    for (program, args) in candidates {
        let spawned = Command::new(program)
            .args(*args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        if let Ok(mut child) = spawned {
            let wrote = child
                .stdin
                .take()
                .map(|mut stdin| stdin.write_all(text.as_bytes()).is_ok())
                .unwrap_or(false);
            if wrote && child.wait().map(|s| s.success()).unwrap_or(false) {
                return true;
            }
        }
    }
    false
}

pub fn run(args: CopyArgs) -> Result<()> {
    let debate_dir = resolve_debate(args.debate.as_deref(), &args.output_dir)?;
    let answer = read_file(&debate_dir, "final-answer.md")
        .context("No final answer found (debate may be incomplete).")?;

    let text = if args.full {
        let mut parts = Vec::new();
        if let Some(prompt) = read_file(&debate_dir, "audit/00-prompt-and-context.md") {
            parts.push(prompt);
        }
        parts.push(answer);
        if let Some(attribution) = read_file(&debate_dir, "audit/attribution.md") {
            parts.push(attribution);
        }
        parts.join("\n\n---\n\n")
    } else {
        answer
    };

    if copy_to_clipboard(&text) {
        println!("Copied to clipboard.");
    } else {
        println!("Clipboard not available. Output printed below:\n");
        println!("{text}");
    }
    Ok(())
}
