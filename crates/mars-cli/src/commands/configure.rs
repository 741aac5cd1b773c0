//! The `mars configure` command: interactive credential capture.
//!
//! Values land in `~/.mars/config` in dotenv format (0600 on unix).
//! Pressing Enter keeps an existing value or skips an unset one.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use mars_runtime::config::{
    config_file_path, parse_dotenv, DEFAULT_OLLAMA_URL, KEY_ANTHROPIC, KEY_DEFAULT_PROVIDERS,
    KEY_GOOGLE, KEY_OLLAMA_URL, KEY_OPENAI,
};

struct ProviderField {
    display: &'static str,
    key: &'static str,
    hint: &'static str,
    is_url: bool,
}

const FIELDS: &[ProviderField] = &[
    ProviderField {
        display: "OpenAI",
        key: KEY_OPENAI,
        hint: "from https://platform.openai.com/api-keys",
        is_url: false,
    },
    ProviderField {
        display: "Anthropic",
        key: KEY_ANTHROPIC,
        hint: "from https://console.anthropic.com/settings/keys",
        is_url: false,
    },
    ProviderField {
        display: "Google AI",
        key: KEY_GOOGLE,
        hint: "from https://aistudio.google.com/apikey",
        is_url: false,
    },
    ProviderField {
        display: "Ollama (local)",
        key: KEY_OLLAMA_URL,
        hint: "default: http://localhost:11434",
        is_url: true,
    },
];

/// Show the first and last 4 characters of a stored key.
fn mask_key(key: &str) -> String {
    if key.chars().count() <= 8 {
        "****".to_string()
    } else {
        let head: String = key.chars().take(4).collect();
        let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
        format!("{head}...{tail}")
    }
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn read_existing(path: &Path) -> BTreeMap<String, String> {
    fs::read_to_string(path).map(|text| parse_dotenv(&text)).unwrap_or_default()
}

fn write_config(path: &Path, values: &BTreeMap<String, String>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut lines = vec!["# MARS configuration - generated by `mars configure`".to_string()];
    for (key, value) in values {
        lines.push(format!("{key}={value}"));
    }
    lines.push(String::new());
    fs::write(path, lines.join("\n"))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let path = config_file_path().context("cannot determine home directory")?;

    println!();
    println!("{}", "Welcome to MARS - Multi-Agent Resolution Synthesis".bold());
    println!("{}", "=".repeat(52));
    println!();
    println!("This will configure your LLM provider API keys.");
    println!("Keys are stored in {}", path.display());
    println!("Press Enter to skip any provider you don't need.");
    println!();

    let existing = read_existing(&path);
    let mut new_config: BTreeMap<String, String> = BTreeMap::new();
    let mut configured: Vec<&str> = Vec::new();
    let mut skipped: Vec<&str> = Vec::new();

    for field in FIELDS {
        let current = existing.get(field.key);
        match current {
            Some(value) if field.is_url => println!("  {}: currently {value}", field.display),
            Some(value) => println!("  {}: currently {}", field.display, mask_key(value)),
            None => println!("  {}: not configured", field.display),
        }

        let label = if field.is_url {
            format!("  {} URL ({})", field.display, field.hint)
        } else {
            format!("  {} API key ({})", field.display, field.hint)
        };
        let mut value = prompt_line(&label)?;
        if value.is_empty() && field.is_url && current.is_none() {
            value = DEFAULT_OLLAMA_URL.to_string();
        }

        if value.is_empty() {
            match current {
                Some(existing_value) => {
                    new_config.insert(field.key.to_string(), existing_value.clone());
                    println!("  Kept existing config.");
                    configured.push(field.display);
                }
                None => {
                    println!("  Skipped.");
                    skipped.push(field.display);
                }
            }
        } else {
            new_config.insert(field.key.to_string(), value);
            configured.push(field.display);
        }
        println!();
    }

    // Default providers for debates.
    let current_defaults = existing.get(KEY_DEFAULT_PROVIDERS);
    if !configured.is_empty() {
        println!("Default providers for debates (comma-separated, e.g. openai,anthropic):");
        if let Some(defaults) = current_defaults {
            println!("  Currently: {defaults}");
        }
        let value = prompt_line("  Default providers")?;
        if !value.is_empty() {
            new_config.insert(KEY_DEFAULT_PROVIDERS.to_string(), value);
        } else if let Some(defaults) = current_defaults {
            new_config.insert(KEY_DEFAULT_PROVIDERS.to_string(), defaults.clone());
        }
        println!();
    }

    if !new_config.is_empty() {
        write_config(&path, &new_config)?;
        println!("Saved to {}", path.display());
        println!();
    }

    println!("{}", "Setup complete!".bold());
    println!();
    if !configured.is_empty() {
        println!("  Configured: {}", configured.join(", "));
    }
    if !skipped.is_empty() {
        println!("  Skipped:    {}", skipped.join(", "));
    }
    println!();
    println!("Next steps:");
    println!("  mars providers          - verify provider status");
    println!("  mars debate \"Question\"  - start a debate");
    println!();
    Ok(())
}
