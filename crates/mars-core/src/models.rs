//! Core data types for a MARS debate.
//!
//! Everything here is plain data: configs are validated once before a
//! run, responses are created inside a strategy and never mutated, and
//! rounds are appended to a result in order.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Extract the base provider name from a participant ID.
///
/// `"openai:gpt-4.1"` -> `"openai"`, `"anthropic"` -> `"anthropic"`.
pub fn provider_base_name(participant: &str) -> &str {
    participant.split(':').next().unwrap_or(participant)
}

/// Debate orchestration mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DebateMode {
    RoundRobin,
    Judge,
}

impl fmt::Display for DebateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoundRobin => write!(f, "round-robin"),
            Self::Judge => write!(f, "judge"),
        }
    }
}

impl FromStr for DebateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round-robin" => Ok(Self::RoundRobin),
            "judge" => Ok(Self::Judge),
            other => Err(format!("unknown mode '{other}' (expected round-robin or judge)")),
        }
    }
}

/// Output verbosity for a run.
///
/// Quiet runs fan out provider calls in parallel behind a spinner;
/// verbose runs stream each provider sequentially so chunks never
/// interleave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Quiet,
    Verbose,
}

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A chat message sent to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Token usage for one provider call.
///
/// Always populated after a completed generate or a fully drained
/// stream; zero is permitted when the back-end reports nothing (local
/// models).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self { input_tokens, output_tokens }
    }

    /// Total tokens in and out.
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// A completed response from one provider. Immutable once emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Participant ID (e.g. `"openai"` or `"openai:gpt-4.1"`).
    pub provider: String,
    /// Concrete model that produced the content.
    pub model: String,
    pub content: String,
    pub usage: TokenUsage,
}

/// One provider's critique of a peer, recorded for the audit trail.
///
/// Round >= 2 responses contain both the critique and the improved
/// answer in a single body, so the same content is recorded once per
/// (author, target) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Critique {
    pub author: String,
    pub target: String,
    pub content: String,
}

/// One debate round: answers keyed by participant, in registration
/// order. Providers that failed in a round are simply absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebateRound {
    /// 1-based round index; 0 is reserved for synthesis.
    pub round_number: u32,
    pub responses: Vec<LlmResponse>,
    pub critiques: Vec<Critique>,
}

impl DebateRound {
    pub fn new(round_number: u32) -> Self {
        Self { round_number, ..Default::default() }
    }

    /// Look up this round's response for a participant.
    pub fn response_for(&self, provider: &str) -> Option<&LlmResponse> {
        self.responses.iter().find(|r| r.provider == provider)
    }
}

/// The complete record of a finished debate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateResult {
    pub prompt: String,
    pub context: Vec<String>,
    pub mode: DebateMode,
    /// Rounds in execution order; never reordered or deleted.
    pub rounds: Vec<DebateRound>,
    /// The synthesis (round-robin) or judgment (judge mode) response.
    pub synthesis: Option<LlmResponse>,
    pub final_answer: String,
    /// Reasoning text preceding the `## Final Answer` heading.
    pub resolution: String,
    pub convergence_reason: String,
}

impl DebateResult {
    pub fn new(prompt: impl Into<String>, context: Vec<String>, mode: DebateMode) -> Self {
        Self {
            prompt: prompt.into(),
            context,
            mode,
            rounds: Vec::new(),
            synthesis: None,
            final_answer: String::new(),
            resolution: String::new(),
            convergence_reason: String::new(),
        }
    }
}

/// Configuration errors, detected before any debate begins.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("at least one provider is required")]
    NoProviders,

    #[error("duplicate provider '{0}'")]
    DuplicateProvider(String),

    #[error("unknown provider '{name}'. Available: {available}")]
    UnknownProvider { name: String, available: String },

    #[error("provider '{provider}' is not configured: {hint}")]
    MissingCredential { provider: String, hint: String },

    #[error("rounds must be at least 1 (got {0})")]
    InvalidRounds(u32),

    #[error("threshold must be between 0.0 and 1.0 (got {0})")]
    InvalidThreshold(f64),

    #[error("max-tokens must be positive")]
    InvalidMaxTokens,

    #[error("temperature must be between 0.0 and 2.0 (got {0})")]
    InvalidTemperature(f32),

    #[error("judge mode requires a judge provider")]
    MissingJudge,

    #[error("judge provider '{0}' is not among the selected providers")]
    JudgeNotSelected(String),

    #[error("synthesis provider '{0}' is not among the selected providers")]
    SynthesisNotSelected(String),
}

/// Immutable configuration for one debate run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateConfig {
    pub prompt: String,
    /// Labelled context blocks prepended to the prompt.
    pub context: Vec<String>,
    /// Participant IDs in registration order; order is significant for
    /// synthesis fallback and attribution tie-breaks.
    pub providers: Vec<String>,
    /// Participant ID -> model override.
    pub model_overrides: BTreeMap<String, String>,
    pub mode: DebateMode,
    /// Maximum debate rounds (>= 1).
    pub rounds: u32,
    pub judge_provider: Option<String>,
    pub synthesis_provider: Option<String>,
    /// Convergence similarity threshold in [0, 1].
    pub threshold: f64,
    pub max_tokens: u32,
    /// When absent, no temperature is transmitted to any back-end.
    pub temperature: Option<f32>,
    /// Additional attempts after a first transient failure.
    pub max_retries: u32,
    pub output_dir: String,
    pub verbosity: Verbosity,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            context: Vec::new(),
            providers: Vec::new(),
            model_overrides: BTreeMap::new(),
            mode: DebateMode::RoundRobin,
            rounds: 3,
            judge_provider: None,
            synthesis_provider: None,
            threshold: 0.85,
            max_tokens: 8192,
            temperature: None,
            max_retries: 3,
            output_dir: "./mars-output".to_string(),
            verbosity: Verbosity::Quiet,
        }
    }
}

impl DebateConfig {
    /// Validate option ranges and cross-field requirements.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }
        for (i, p) in self.providers.iter().enumerate() {
            if self.providers[..i].contains(p) {
                return Err(ConfigError::DuplicateProvider(p.clone()));
            }
        }
        if self.rounds < 1 {
            return Err(ConfigError::InvalidRounds(self.rounds));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::InvalidMaxTokens);
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::InvalidTemperature(t));
            }
        }
        match (self.mode, &self.judge_provider) {
            (DebateMode::Judge, None) => return Err(ConfigError::MissingJudge),
            (DebateMode::Judge, Some(j)) if !self.providers.contains(j) => {
                return Err(ConfigError::JudgeNotSelected(j.clone()));
            }
            _ => {}
        }
        if let Some(s) = &self.synthesis_provider {
            if !self.providers.contains(s) {
                return Err(ConfigError::SynthesisNotSelected(s.clone()));
            }
        }
        Ok(())
    }

    /// Model override for a participant, if any.
    pub fn model_override(&self, participant: &str) -> Option<&str> {
        self.model_overrides.get(participant).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> DebateConfig {
        DebateConfig {
            prompt: "Is the sky blue?".to_string(),
            providers: vec!["openai".to_string(), "anthropic".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_base_name_extraction() {
        assert_eq!(provider_base_name("openai"), "openai");
        assert_eq!(provider_base_name("openai:gpt-4.1-mini"), "openai");
        assert_eq!(provider_base_name("anthropic:claude-sonnet-4:extra"), "anthropic");
    }

    #[test]
    fn test_mode_round_trip() {
        assert_eq!(DebateMode::RoundRobin.to_string(), "round-robin");
        assert_eq!("judge".parse::<DebateMode>().unwrap(), DebateMode::Judge);
        assert!("panel".parse::<DebateMode>().is_err());
    }

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::user("u").role, Role::User);
        assert_eq!(Message::assistant("a").role, Role::Assistant);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }

    #[test]
    fn test_usage_total() {
        assert_eq!(TokenUsage::new(100, 50).total(), 150);
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_empty_providers_rejected() {
        let config = DebateConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::NoProviders)));
    }

    #[test]
    fn test_duplicate_provider_rejected() {
        let mut config = valid_config();
        config.providers.push("openai".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateProvider(_))));
    }

    #[test]
    fn test_zero_rounds_rejected() {
        let mut config = valid_config();
        config.rounds = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRounds(0))));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config = valid_config();
        config.threshold = 1.2;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidThreshold(_))));
    }

    #[test]
    fn test_temperature_bounds() {
        let mut config = valid_config();
        config.temperature = Some(2.0);
        assert!(config.validate().is_ok());
        config.temperature = Some(2.1);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTemperature(_))));
    }

    #[test]
    fn test_judge_mode_requires_judge() {
        let mut config = valid_config();
        config.mode = DebateMode::Judge;
        assert!(matches!(config.validate(), Err(ConfigError::MissingJudge)));

        config.judge_provider = Some("google".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::JudgeNotSelected(_))));

        config.judge_provider = Some("anthropic".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_synthesis_provider_must_be_selected() {
        let mut config = valid_config();
        config.synthesis_provider = Some("google".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::SynthesisNotSelected(_))));
    }

    #[test]
    fn test_round_lookup() {
        let mut round = DebateRound::new(1);
        round.responses.push(LlmResponse {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            content: "hi".to_string(),
            usage: TokenUsage::default(),
        });
        assert!(round.response_for("openai").is_some());
        assert!(round.response_for("anthropic").is_none());
    }
}
