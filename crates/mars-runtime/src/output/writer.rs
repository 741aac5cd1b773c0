//! Step-wise Markdown audit writer.
//!
//! Each run gets `<output-dir>/<timestamp>_<slug>/` with an `audit/`
//! subtree. Files are written as each step completes, so an
//! interrupted run leaves a partial but consistent trail. Every file
//! is written exactly once by a single writer.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;

use mars_core::{AttributionReport, CostReport, Critique, LlmResponse, RoundDiff};

/// Turn a prompt into a filesystem-safe slug.
///
/// Lowercased alphanumeric runs joined by `-`, built from the first 60
/// characters of the prompt.
pub fn slugify(prompt: &str) -> String {
    let head: String = prompt.chars().take(60).collect();
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in head.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("debate");
    }
    slug
}

pub struct OutputWriter {
    base: PathBuf,
    audit: PathBuf,
}

impl OutputWriter {
    /// Create the run directory and audit subtree.
    pub fn new(output_dir: &str, prompt: &str) -> io::Result<Self> {
        let timestamp = Local::now().format("%Y-%m-%dT%H-%M-%S");
        let base = Path::new(output_dir).join(format!("{timestamp}_{}", slugify(prompt)));
        let audit = base.join("audit");
        fs::create_dir_all(&audit)?;
        Ok(Self { base, audit })
    }

    /// Root of this run's output directory.
    pub fn base_path(&self) -> &Path {
        &self.base
    }

    pub fn write_prompt(&self, prompt: &str, context: &[String]) -> io::Result<()> {
        let mut lines = vec![format!("# Prompt\n\n{prompt}\n")];
        if !context.is_empty() {
            lines.push("\n# Context\n".to_string());
            for (i, ctx) in context.iter().enumerate() {
                lines.push(format!("\n## Context {}\n\n{ctx}\n", i + 1));
            }
        }
        fs::write(self.audit.join("00-prompt-and-context.md"), lines.join("\n"))
    }

    /// Write one round's responses (and critiques for rounds >= 2).
    pub fn write_round(
        &self,
        round_number: u32,
        responses: &[LlmResponse],
        critiques: &[Critique],
    ) -> io::Result<()> {
        let mut parts: Vec<String> = Vec::new();
        if critiques.is_empty() {
            parts.push(format!("# Round {round_number} - Initial Responses\n"));
        } else {
            parts.push(format!("# Round {round_number} - Critiques & Improved Answers\n"));
            for c in critiques {
                parts.push(format!("\n## {} critiques {}\n\n{}\n", c.author, c.target, c.content));
            }
            parts.push("\n---\n\n# Improved Answers\n".to_string());
        }
        for r in responses {
            parts.push(format!("\n## {} ({})\n\n{}\n", r.provider, r.model, r.content));
        }

        let label = if critiques.is_empty() { "responses" } else { "critiques" };
        let filename = format!("{round_number:02}-round-{round_number}-{label}.md");
        fs::write(self.audit.join(filename), parts.join("\n"))
    }

    pub fn write_convergence(&self, reason: &str) -> io::Result<()> {
        fs::write(self.audit.join("convergence.md"), format!("# Convergence\n\n{reason}\n"))
    }

    pub fn write_resolution(&self, reasoning: &str) -> io::Result<()> {
        fs::write(self.audit.join("resolution.md"), format!("# Resolution\n\n{reasoning}\n"))
    }

    /// Write the final answer at the run root. Only called on success;
    /// a failed synthesis leaves no `final-answer.md`.
    pub fn write_final(&self, answer: &str) -> io::Result<()> {
        fs::write(self.base.join("final-answer.md"), answer)
    }

    pub fn write_attribution(&self, report: &AttributionReport) -> io::Result<()> {
        let mut lines = vec!["# Attribution Analysis\n".to_string()];
        lines.push(format!(
            "Similarity threshold: {}  \nFinal answer sentences: {}\n",
            report.attribution_threshold, report.final_sentence_count
        ));
        lines.push("\n## Summary\n".to_string());
        lines.push("| Provider | Model | Contribution | Survival | Influence |".to_string());
        lines.push("|----------|-------|-------------|----------|-----------|".to_string());
        for pa in &report.providers {
            lines.push(format!(
                "| {} | {} | {:.1}% ({}/{}) | {:.1}% ({}/{}) | {:.1}% |",
                pa.provider,
                pa.model,
                pa.contribution * 100.0,
                pa.contributed_sentences,
                pa.total_final_sentences,
                pa.survival * 100.0,
                pa.survived_sentences,
                pa.initial_sentences,
                pa.influence * 100.0,
            ));
        }
        if report.novel_sentences > 0 {
            lines.push(format!(
                "| *Synthesizer (novel)* | - | {:.1}% ({}/{}) | - | - |",
                report.novel_in_synthesis * 100.0,
                report.novel_sentences,
                report.final_sentence_count,
            ));
        }
        lines.push("\n## Metric Definitions\n".to_string());
        lines.push(
            "- **Contribution**: share of final answer sentences whose best match \
             (above threshold) traces to this provider."
                .to_string(),
        );
        lines.push(
            "- **Survival**: share of this provider's round-1 sentences that appear \
             (above threshold) in the final answer."
                .to_string(),
        );
        lines.push(
            "- **Influence**: share of this provider's sentences adopted by other \
             providers in subsequent rounds."
                .to_string(),
        );
        for pa in &report.providers {
            if !pa.influence_details.is_empty() {
                lines.push(format!("\n### {} Influence Breakdown\n", pa.provider));
                for (target, rate) in &pa.influence_details {
                    lines.push(format!("- Adopted by **{target}**: {:.1}%", rate * 100.0));
                }
            }
        }
        fs::write(self.audit.join("attribution.md"), lines.join("\n"))
    }

    pub fn write_costs(&self, report: &CostReport) -> io::Result<()> {
        let mut lines = vec!["# Cost Summary\n".to_string()];
        lines.push("| Provider | Model | Input Tokens | Output Tokens | Cost | Share |".to_string());
        lines.push("|----------|-------|-------------|--------------|------|-------|".to_string());
        for pc in &report.providers {
            lines.push(format!(
                "| {} | {} | {} | {} | ${:.4} | {:.1}% |",
                pc.provider,
                pc.model,
                pc.input_tokens,
                pc.output_tokens,
                pc.total_cost,
                pc.share_of_total * 100.0,
            ));
        }
        lines.push(format!(
            "\n**Total**: {} tokens | ${:.4}",
            report.total_input_tokens + report.total_output_tokens,
            report.total_cost,
        ));
        for warning in &report.warnings {
            lines.push(format!("\n*Warning: {warning}*"));
        }
        fs::write(self.audit.join("costs.md"), lines.join("\n"))
    }

    pub fn write_round_diffs(&self, diffs: &[RoundDiff]) -> io::Result<()> {
        if diffs.is_empty() {
            return Ok(());
        }
        let mut lines = vec!["# Round-over-Round Changes\n".to_string()];
        lines.push("| Provider | Rounds | Similarity | Added | Removed | Unchanged |".to_string());
        lines.push("|----------|--------|-----------|-------|---------|-----------|".to_string());
        for d in diffs {
            lines.push(format!(
                "| {} | {}->{} | {:.1}% | +{} | -{} | {} |",
                d.provider,
                d.from_round,
                d.to_round,
                d.similarity * 100.0,
                d.sentences_added,
                d.sentences_removed,
                d.sentences_unchanged,
            ));
        }
        fs::write(self.audit.join("round-diffs.md"), lines.join("\n"))
    }
}
