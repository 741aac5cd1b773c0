//! # mars-runtime
//!
//! Orchestration runtime for MARS debates: the provider abstraction
//! over vendor HTTP APIs, retry and credential handling, the two
//! debate strategies, and the terminal/audit output surfaces.
//!
//! The typical entry point is [`DebateEngine`]: build a validated
//! [`mars_core::DebateConfig`], load the [`config::AppConfig`]
//! credentials, and call [`DebateEngine::run`].

pub mod config;
pub mod debate;
pub mod display;
pub mod output;
pub mod providers;

pub use debate::{DebateEngine, DebateError};
pub use providers::{CallOptions, LlmProvider, ProviderError, TextStream};
