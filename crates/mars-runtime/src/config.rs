//! Application configuration from layered `MARS_*` sources.
//!
//! Precedence, highest first: process environment variables, a local
//! `.env`, then `~/.mars/config`. Both files use dotenv `KEY=value`
//! format. A value set by a higher-priority source is never
//! overridden by a lower one.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::providers::{ApiCredential, CredentialSource};

/// Recognised configuration keys.
pub const KEY_OPENAI: &str = "MARS_OPENAI_API_KEY";
pub const KEY_ANTHROPIC: &str = "MARS_ANTHROPIC_API_KEY";
pub const KEY_GOOGLE: &str = "MARS_GOOGLE_API_KEY";
pub const KEY_OLLAMA_URL: &str = "MARS_OLLAMA_BASE_URL";
pub const KEY_DEFAULT_PROVIDERS: &str = "MARS_DEFAULT_PROVIDERS";

const ALL_KEYS: &[&str] =
    &[KEY_OPENAI, KEY_ANTHROPIC, KEY_GOOGLE, KEY_OLLAMA_URL, KEY_DEFAULT_PROVIDERS];

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Path to the user-home config file (`~/.mars/config`).
pub fn config_file_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".mars").join("config"))
}

/// Default model per base provider name.
pub fn default_model(base: &str) -> Option<&'static str> {
    match base {
        "openai" => Some("gpt-4o"),
        "anthropic" => Some("claude-sonnet-4-20250514"),
        "google" => Some("gemini-2.0-flash"),
        "ollama" => Some("llama3.2"),
        _ => None,
    }
}

/// Parse dotenv-format text into key/value pairs.
///
/// Blank lines and `#` comments are skipped; values are trimmed.
pub fn parse_dotenv(text: &str) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            values.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    values
}

/// Resolved application configuration.
pub struct AppConfig {
    pub openai_api_key: Option<ApiCredential>,
    pub anthropic_api_key: Option<ApiCredential>,
    pub google_api_key: Option<ApiCredential>,
    pub ollama_base_url: String,
    default_providers: Option<String>,
}

impl AppConfig {
    /// Load configuration from all sources.
    pub fn load() -> Self {
        let mut layered: BTreeMap<String, (String, CredentialSource)> = BTreeMap::new();

        // Highest priority first; later layers only fill gaps.
        for key in ALL_KEYS {
            if let Ok(value) = std::env::var(key) {
                layered.insert(key.to_string(), (value, CredentialSource::Environment));
            }
        }

        if let Ok(text) = std::fs::read_to_string(".env") {
            for (key, value) in parse_dotenv(&text) {
                layered.entry(key).or_insert((value, CredentialSource::DotEnv));
            }
        }

        if let Some(path) = config_file_path() {
            if let Ok(text) = std::fs::read_to_string(&path) {
                warn_if_world_readable(&path);
                for (key, value) in parse_dotenv(&text) {
                    layered.entry(key).or_insert((value, CredentialSource::ConfigFile));
                }
            }
        }

        Self::from_layered(layered)
    }

    fn from_layered(mut layered: BTreeMap<String, (String, CredentialSource)>) -> Self {
        let mut credential = |key: &str| {
            layered
                .remove(key)
                .filter(|(value, _)| !value.is_empty())
                .map(|(value, source)| ApiCredential::new(value, source))
        };

        let openai_api_key = credential(KEY_OPENAI);
        let anthropic_api_key = credential(KEY_ANTHROPIC);
        let google_api_key = credential(KEY_GOOGLE);

        let ollama_base_url = layered
            .remove(KEY_OLLAMA_URL)
            .map(|(value, _)| value)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
        let default_providers = layered
            .remove(KEY_DEFAULT_PROVIDERS)
            .map(|(value, _)| value)
            .filter(|v| !v.is_empty());

        Self {
            openai_api_key,
            anthropic_api_key,
            google_api_key,
            ollama_base_url,
            default_providers,
        }
    }

    /// Build a config from a pre-resolved layer map, bypassing the
    /// process environment and filesystem.
    #[cfg(test)]
    pub(crate) fn load_for_tests(
        layered: BTreeMap<String, (String, CredentialSource)>,
    ) -> Self {
        Self::from_layered(layered)
    }

    /// Credential for a base provider name, if configured.
    pub fn api_key(&self, base: &str) -> Option<&ApiCredential> {
        match base {
            "openai" => self.openai_api_key.as_ref(),
            "anthropic" => self.anthropic_api_key.as_ref(),
            "google" => self.google_api_key.as_ref(),
            _ => None,
        }
    }

    /// Default participant list when the CLI selects none.
    pub fn default_providers(&self) -> Vec<String> {
        match &self.default_providers {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
            None => vec!["openai".to_string(), "anthropic".to_string()],
        }
    }
}

#[cfg(unix)]
fn warn_if_world_readable(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(meta) = std::fs::metadata(path) {
        let mode = meta.permissions().mode();
        if mode & 0o044 != 0 {
            tracing::warn!(
                path = %path.display(),
                mode = format!("{:o}", mode & 0o777),
                "config file is readable by other users; run: chmod 600 {}",
                path.display()
            );
        }
    }
}

#[cfg(not(unix))]
fn warn_if_world_readable(_path: &std::path::Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotenv_skips_comments_and_blanks() {
        let text = "# comment\n\nMARS_OPENAI_API_KEY=sk-123\nMARS_OLLAMA_BASE_URL = http://host:1 \n";
        let values = parse_dotenv(text);
        assert_eq!(values.len(), 2);
        assert_eq!(values["MARS_OPENAI_API_KEY"], "sk-123");
        assert_eq!(values["MARS_OLLAMA_BASE_URL"], "http://host:1");
    }

    #[test]
    fn test_parse_dotenv_keeps_equals_in_value() {
        let values = parse_dotenv("KEY=a=b=c");
        assert_eq!(values["KEY"], "a=b=c");
    }

    fn layered_with(
        entries: &[(&str, &str)],
    ) -> BTreeMap<String, (String, CredentialSource)> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), (v.to_string(), CredentialSource::ConfigFile)))
            .collect()
    }

    #[test]
    fn test_missing_keys_leave_credentials_unset() {
        let config = AppConfig::from_layered(BTreeMap::new());
        assert!(config.openai_api_key.is_none());
        assert!(config.api_key("anthropic").is_none());
        assert_eq!(config.ollama_base_url, DEFAULT_OLLAMA_URL);
    }

    #[test]
    fn test_credentials_resolved_by_base_name() {
        let config = AppConfig::from_layered(layered_with(&[
            (KEY_OPENAI, "sk-openai"),
            (KEY_GOOGLE, "AIza-google"),
        ]));
        assert_eq!(config.api_key("openai").unwrap().expose(), "sk-openai");
        assert_eq!(config.api_key("google").unwrap().expose(), "AIza-google");
        assert!(config.api_key("anthropic").is_none());
        assert!(config.api_key("ollama").is_none());
    }

    #[test]
    fn test_empty_value_treated_as_unset() {
        let config = AppConfig::from_layered(layered_with(&[(KEY_ANTHROPIC, "")]));
        assert!(config.anthropic_api_key.is_none());
    }

    #[test]
    fn test_default_providers_parsing() {
        let config = AppConfig::from_layered(layered_with(&[(
            KEY_DEFAULT_PROVIDERS,
            "openai:gpt-4o-mini, google ,",
        )]));
        assert_eq!(config.default_providers(), vec!["openai:gpt-4o-mini", "google"]);

        let config = AppConfig::from_layered(BTreeMap::new());
        assert_eq!(config.default_providers(), vec!["openai", "anthropic"]);
    }

    #[test]
    fn test_default_models() {
        assert_eq!(default_model("openai"), Some("gpt-4o"));
        assert_eq!(default_model("ollama"), Some("llama3.2"));
        assert_eq!(default_model("vertex"), None);
    }
}
