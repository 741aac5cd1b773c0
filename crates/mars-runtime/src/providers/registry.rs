//! Participant ID -> provider construction.
//!
//! A participant ID is a base provider name with an optional model
//! suffix (`"openai"`, `"openai:gpt-4.1-mini"`). Unknown names and
//! missing credentials surface as configuration errors before any
//! debate begins.

use std::sync::Arc;

use mars_core::{provider_base_name, ConfigError};

use super::{
    AnthropicProvider, ApiCredential, GoogleProvider, LlmProvider, OllamaProvider,
    OpenAiProvider,
};
use crate::config::{default_model, AppConfig};

/// Base provider names MARS knows how to construct.
pub const AVAILABLE_PROVIDERS: &[&str] = &["openai", "anthropic", "google", "ollama"];

/// Whether a base name is a known provider.
pub fn is_known_provider(base: &str) -> bool {
    AVAILABLE_PROVIDERS.contains(&base)
}

fn require_key(config: &AppConfig, base: &str) -> Result<ApiCredential, ConfigError> {
    config.api_key(base).cloned().ok_or_else(|| ConfigError::MissingCredential {
        provider: base.to_string(),
        hint: format!("set MARS_{}_API_KEY (env, .env, or ~/.mars/config)", base.to_uppercase()),
    })
}

/// Construct the provider behind a participant ID.
pub fn create_provider(
    participant: &str,
    config: &AppConfig,
) -> Result<Arc<dyn LlmProvider>, ConfigError> {
    let base = provider_base_name(participant);
    match base {
        "openai" => {
            let key = require_key(config, base)?;
            Ok(Arc::new(OpenAiProvider::new(key, default_model(base).unwrap())))
        }
        "anthropic" => {
            let key = require_key(config, base)?;
            Ok(Arc::new(AnthropicProvider::new(key, default_model(base).unwrap())))
        }
        "google" => {
            let key = require_key(config, base)?;
            Ok(Arc::new(GoogleProvider::new(key, default_model(base).unwrap())))
        }
        "ollama" => Ok(Arc::new(OllamaProvider::new(
            config.ollama_base_url.clone(),
            default_model(base).unwrap(),
        ))),
        other => Err(ConfigError::UnknownProvider {
            name: other.to_string(),
            available: AVAILABLE_PROVIDERS.join(", "),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn empty_config() -> AppConfig {
        // No env/file access in tests; an empty layered map behaves
        // like a machine with nothing configured.
        AppConfig::load_for_tests(BTreeMap::new())
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = match create_provider("vertex", &empty_config()) {
            Err(e) => e,
            Ok(_) => panic!("expected error"),
        };
        let msg = err.to_string();
        assert!(msg.contains("vertex"));
        assert!(msg.contains("openai, anthropic, google, ollama"));
    }

    #[test]
    fn test_missing_credential_rejected() {
        let err = match create_provider("openai", &empty_config()) {
            Err(e) => e,
            Ok(_) => panic!("expected error"),
        };
        assert!(err.to_string().contains("MARS_OPENAI_API_KEY"));
    }

    #[test]
    fn test_ollama_needs_no_credential() {
        let provider = create_provider("ollama", &empty_config()).unwrap();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.default_model(), "llama3.2");
    }

    #[test]
    fn test_participant_suffix_ignored_for_construction() {
        let mut layered = BTreeMap::new();
        layered.insert(
            crate::config::KEY_GOOGLE.to_string(),
            ("AIza-test".to_string(), crate::providers::CredentialSource::Environment),
        );
        let config = AppConfig::load_for_tests(layered);
        let provider = create_provider("google:gemini-2.5-pro", &config).unwrap();
        assert_eq!(provider.name(), "google");
    }
}
