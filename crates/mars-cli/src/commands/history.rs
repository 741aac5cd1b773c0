//! The `mars history` command: list past debates.

use anyhow::{bail, Result};
use clap::Args;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, CellAlignment, Table};

use mars_runtime::output::reader::{
    count_rounds, extract_prompt_from_dirname, extract_timestamp, find_debates,
    parse_costs_total, parse_providers, read_file,
};

#[derive(Args)]
pub struct HistoryArgs {
    /// Show only the last N debates
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// Output directory
    #[arg(short, long, default_value = "./mars-output")]
    output_dir: String,
}

pub fn run(args: HistoryArgs) -> Result<()> {
    let mut debates = find_debates(&args.output_dir);
    if debates.is_empty() {
        bail!("No debates found in {}", args.output_dir);
    }
    if let Some(limit) = args.limit {
        debates.truncate(limit);
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec!["#", "Timestamp", "Prompt", "Providers", "Rounds", "Cost"]);

    for (i, dir) in debates.iter().enumerate() {
        let dirname = dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let mut prompt = extract_prompt_from_dirname(dirname);
        if prompt.chars().count() > 40 {
            prompt = format!("{}...", prompt.chars().take(37).collect::<String>());
        }
        let cost = read_file(dir, "audit/costs.md")
            .map(|c| parse_costs_total(&c))
            .unwrap_or_else(|| "n/a".to_string());

        table.add_row(vec![
            Cell::new((i + 1).to_string()),
            Cell::new(extract_timestamp(dirname)),
            Cell::new(prompt),
            Cell::new(parse_providers(dir).join(", ")),
            Cell::new(count_rounds(dir).to_string()).set_alignment(CellAlignment::Right),
            Cell::new(cost).set_alignment(CellAlignment::Right),
        ]);
    }

    println!("{table}");
    Ok(())
}
