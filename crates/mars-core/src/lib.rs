//! # mars-core
//!
//! Data model and analysis pipeline for MARS (Multi-Agent Resolution
//! Synthesis) debates.
//!
//! Everything in this crate is deterministic, synchronous computation:
//! the debate record types, the character-level similarity kernel, the
//! sentence-level attribution analyzer, and the cost analyzer. The
//! async orchestration that produces a [`DebateResult`] lives in
//! `mars-runtime`.

pub mod attribution;
pub mod costs;
pub mod models;
pub mod similarity;

pub use attribution::{
    AttributionAnalyzer, AttributionReport, ProviderAttribution, RoundDiff,
    ATTRIBUTION_THRESHOLD,
};
pub use costs::{compute_costs, CostReport, ProviderCost};
pub use models::{
    provider_base_name, ConfigError, Critique, DebateConfig, DebateMode, DebateResult,
    DebateRound, LlmResponse, Message, Role, TokenUsage, Verbosity,
};
