//! Debate orchestration: strategies, prompt construction, and the
//! engine that ties providers, renderer, and writer together.

pub mod engine;
pub mod judge;
pub mod prompts;
pub mod round_robin;
pub mod strategy;

pub use engine::DebateEngine;
pub use judge::JudgeStrategy;
pub use round_robin::RoundRobinStrategy;
pub use strategy::{DebateContext, DebateStrategy, ProviderHandle};

use thiserror::Error;

use mars_core::ConfigError;

use crate::providers::ProviderError;

/// Run-level errors; per-provider failures inside a round are handled
/// by the strategies and only surface here when no recovery is
/// possible.
#[derive(Error, Debug)]
pub enum DebateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("all providers failed in round {round}. First error: {cause}")]
    RoundFailed { round: u32, cause: String },

    #[error("all providers failed during synthesis. Last error: {cause}")]
    SynthesisExhausted { cause: String },

    #[error("judge call failed: {source}")]
    JudgeFailed {
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
