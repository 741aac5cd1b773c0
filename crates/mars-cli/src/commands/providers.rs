//! The `mars providers` command.

use anyhow::Result;
use colored::Colorize;

use mars_runtime::config::{default_model, AppConfig};
use mars_runtime::providers::registry::AVAILABLE_PROVIDERS;

pub fn run() -> Result<()> {
    let config = AppConfig::load();
    for name in AVAILABLE_PROVIDERS {
        let status = match *name {
            "ollama" => format!("url: {}", config.ollama_base_url),
            _ if config.api_key(name).is_some() => "configured".green().to_string(),
            _ => "not configured".yellow().to_string(),
        };
        let model = default_model(name).unwrap_or("-");
        println!("  {name:<12} model: {model:<32} ({status})");
    }
    Ok(())
}
