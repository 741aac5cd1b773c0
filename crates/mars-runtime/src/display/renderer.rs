//! Terminal renderer.
//!
//! In quiet mode providers run in parallel behind a single spinner; in
//! verbose mode chunks are passed straight through, one provider at a
//! time. At most one progress indicator is ever active: starting a new
//! work scope stops the previous one.

use std::io::Write;
use std::time::Duration;

use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, CellAlignment, Table};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;

use mars_core::{AttributionReport, CostReport, DebateResult, RoundDiff, Verbosity};

fn pct(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

fn styled_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
    table
}

pub struct Renderer {
    verbose: bool,
    spinner: Mutex<Option<ProgressBar>>,
}

impl Renderer {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbose: verbosity == Verbosity::Verbose, spinner: Mutex::new(None) }
    }

    fn rule(&self, title: &str) {
        println!("\n{} {} {}", "──".blue(), title.bold(), "─".repeat(40).blue());
    }

    pub fn start_debate(&self, prompt: &str, providers: &[String], mode: &str) {
        let shown: String = if prompt.chars().count() > 120 {
            format!("{}...", prompt.chars().take(120).collect::<String>())
        } else {
            prompt.to_string()
        };
        println!("{}", "Debate Configuration".bold());
        println!("  {} {}", "Prompt:".cyan(), shown);
        println!("  {} {}", "Mode:".cyan(), mode);
        println!("  {} {}", "Providers:".cyan(), providers.join(", "));
        println!();
    }

    pub fn start_round(&self, round_number: u32) {
        if round_number == 0 {
            self.rule("Synthesis");
        } else {
            self.rule(&format!("Round {round_number}"));
        }
    }

    /// Show a spinner in quiet mode. Any previous spinner is stopped
    /// first.
    pub fn start_work(&self, providers: &[String], phase: &str) {
        if self.verbose {
            return;
        }
        self.stop_work();
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner().template("{spinner:.blue} {msg}").unwrap(),
        );
        bar.set_message(format!("{phase}: {}", providers.join(", ")));
        bar.enable_steady_tick(Duration::from_millis(100));
        *self.spinner.lock() = Some(bar);
    }

    /// Stop the active spinner, if any.
    pub fn stop_work(&self) {
        if let Some(bar) = self.spinner.lock().take() {
            bar.finish_and_clear();
        }
    }

    pub fn start_provider_stream(&self, provider: &str) {
        if self.verbose {
            println!("\n{}:", provider.green().bold());
        }
    }

    pub fn stream_chunk(&self, chunk: &str) {
        if self.verbose {
            print!("{chunk}");
            let _ = std::io::stdout().flush();
        }
    }

    pub fn end_provider_stream(&self) {
        if self.verbose {
            println!();
        }
    }

    pub fn show_response(&self, provider: &str, content: &str) {
        if self.verbose {
            return;
        }
        println!("\n{}", provider.green().bold());
        println!("{}", "─".repeat(60).green());
        println!("{content}");
        println!("{}", "─".repeat(60).green());
    }

    pub fn show_error(&self, provider: &str, error: &str) {
        self.stop_work();
        eprintln!("{} {}", format!("Error from {provider}:").red().bold(), error);
    }

    pub fn show_convergence(&self, reason: &str) {
        println!("\n{} {}", "Convergence:".yellow().bold(), reason);
    }

    pub fn show_final_answer(&self, result: &DebateResult) {
        self.rule("Final Answer");
        println!("{}", result.final_answer);
    }

    pub fn show_attribution(&self, report: &AttributionReport) {
        self.rule("Attribution Analysis");
        let mut table = styled_table();
        table.set_header(vec!["Provider", "Model", "Contribution", "Survival", "Influence"]);
        for pa in &report.providers {
            table.add_row(vec![
                Cell::new(&pa.provider),
                Cell::new(&pa.model),
                Cell::new(format!(
                    "{} ({}/{})",
                    pct(pa.contribution),
                    pa.contributed_sentences,
                    pa.total_final_sentences
                ))
                .set_alignment(CellAlignment::Right),
                Cell::new(format!(
                    "{} ({}/{})",
                    pct(pa.survival),
                    pa.survived_sentences,
                    pa.initial_sentences
                ))
                .set_alignment(CellAlignment::Right),
                Cell::new(pct(pa.influence)).set_alignment(CellAlignment::Right),
            ]);
        }
        if report.novel_sentences > 0 {
            table.add_row(vec![
                Cell::new("synthesizer (novel)"),
                Cell::new("-"),
                Cell::new(format!(
                    "{} ({}/{})",
                    pct(report.novel_in_synthesis),
                    report.novel_sentences,
                    report.final_sentence_count
                ))
                .set_alignment(CellAlignment::Right),
                Cell::new("-"),
                Cell::new("-"),
            ]);
        }
        println!("{table}");
        println!(
            "{}",
            format!(
                "Similarity threshold: {}  |  Final answer sentences: {}",
                report.attribution_threshold, report.final_sentence_count
            )
            .dimmed()
        );
    }

    pub fn show_round_diffs(&self, diffs: &[RoundDiff]) {
        if diffs.is_empty() {
            return;
        }
        self.rule("Round-over-Round Changes");
        let mut table = styled_table();
        table.set_header(vec!["Provider", "Rounds", "Similarity", "Added", "Removed", "Unchanged"]);
        for d in diffs {
            table.add_row(vec![
                Cell::new(&d.provider),
                Cell::new(format!("{}->{}", d.from_round, d.to_round)),
                Cell::new(pct(d.similarity)).set_alignment(CellAlignment::Right),
                Cell::new(format!("+{}", d.sentences_added)).set_alignment(CellAlignment::Right),
                Cell::new(format!("-{}", d.sentences_removed)).set_alignment(CellAlignment::Right),
                Cell::new(d.sentences_unchanged.to_string()).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("{table}");
    }

    pub fn show_costs(&self, report: &CostReport) {
        self.rule("Cost Summary");
        let mut table = styled_table();
        table.set_header(vec!["Provider", "Model", "Input", "Output", "Cost", "Share"]);
        for pc in &report.providers {
            table.add_row(vec![
                Cell::new(&pc.provider),
                Cell::new(&pc.model),
                Cell::new(pc.input_tokens.to_string()).set_alignment(CellAlignment::Right),
                Cell::new(pc.output_tokens.to_string()).set_alignment(CellAlignment::Right),
                Cell::new(format!("${:.4}", pc.total_cost)).set_alignment(CellAlignment::Right),
                Cell::new(pct(pc.share_of_total)).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("{table}");
        println!(
            "{}",
            format!(
                "Total: {} tokens  |  ${:.4}",
                report.total_input_tokens + report.total_output_tokens,
                report.total_cost
            )
            .dimmed()
        );
        for warning in &report.warnings {
            println!("{} {}", "Warning:".yellow(), warning);
        }
    }

    pub fn show_output_path(&self, path: &str) {
        println!("\n{}", format!("Output written to: {path}").dimmed());
    }
}
