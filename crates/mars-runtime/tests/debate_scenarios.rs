//! End-to-end debate scenarios against scripted in-process providers.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use mars_core::{
    AttributionAnalyzer, DebateConfig, DebateMode, Message, TokenUsage, Verbosity,
};
use mars_runtime::debate::{
    DebateContext, DebateError, DebateStrategy, JudgeStrategy, ProviderHandle,
    RoundRobinStrategy,
};
use mars_runtime::display::Renderer;
use mars_runtime::output::OutputWriter;
use mars_runtime::{CallOptions, LlmProvider, ProviderError, TextStream};

/// One scripted provider call.
#[derive(Clone)]
enum Step {
    Ok(&'static str),
    Fatal(&'static str),
    Transient(&'static str),
}

struct MockProvider {
    name: &'static str,
    steps: Mutex<VecDeque<Step>>,
    last_usage: Arc<Mutex<TokenUsage>>,
}

impl MockProvider {
    fn new(name: &'static str, steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            name,
            steps: Mutex::new(steps.into()),
            last_usage: Arc::new(Mutex::new(TokenUsage::default())),
        })
    }

    fn next_step(&self) -> Result<&'static str, ProviderError> {
        match self.steps.lock().pop_front() {
            Some(Step::Ok(text)) => Ok(text),
            Some(Step::Fatal(message)) => {
                Err(ProviderError::Api { status: 400, message: message.to_string() })
            }
            Some(Step::Transient(message)) => {
                Err(ProviderError::Http(format!("connection failed: {message}")))
            }
            None => Err(ProviderError::Api {
                status: 400,
                message: "script exhausted".to_string(),
            }),
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    fn last_usage(&self) -> TokenUsage {
        *self.last_usage.lock()
    }

    async fn generate(
        &self,
        _messages: &[Message],
        _options: &CallOptions,
    ) -> Result<(String, TokenUsage), ProviderError> {
        let text = self.next_step()?;
        let usage = TokenUsage::new(10, 20);
        *self.last_usage.lock() = usage;
        Ok((text.to_string(), usage))
    }

    async fn stream(
        &self,
        _messages: &[Message],
        _options: &CallOptions,
    ) -> Result<TextStream, ProviderError> {
        let text = self.next_step()?;
        *self.last_usage.lock() = TokenUsage::default();
        let usage_slot = Arc::clone(&self.last_usage);

        let stream = async_stream::try_stream! {
            let mid = text.len() / 2;
            yield text[..mid].to_string();
            yield text[mid..].to_string();
            *usage_slot.lock() = TokenUsage::new(10, 20);
        };
        Ok(Box::pin(stream))
    }
}

fn handle(name: &'static str, steps: Vec<Step>) -> ProviderHandle {
    ProviderHandle { id: name.to_string(), provider: MockProvider::new(name, steps) }
}

fn config(providers: &[&str]) -> DebateConfig {
    DebateConfig {
        prompt: "Is the sky blue?".to_string(),
        providers: providers.iter().map(|p| p.to_string()).collect(),
        max_retries: 0,
        ..Default::default()
    }
}

fn context(providers: Vec<ProviderHandle>, config: DebateConfig, dir: &TempDir) -> DebateContext {
    let writer = OutputWriter::new(dir.path().to_str().unwrap(), &config.prompt).unwrap();
    DebateContext {
        providers,
        config,
        renderer: Arc::new(Renderer::new(Verbosity::Quiet)),
        writer: Arc::new(writer),
    }
}

const STABLE_ANSWER: &str = "The sky is blue today.";

#[tokio::test]
async fn converges_when_answers_stabilize() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&["alpha", "beta"]);
    cfg.rounds = 3;
    cfg.threshold = 0.85;

    let providers = vec![
        handle(
            "alpha",
            vec![
                Step::Ok(STABLE_ANSWER),
                Step::Ok(STABLE_ANSWER),
                Step::Ok("merged\n## Final Answer\nThe sky is blue today."),
            ],
        ),
        handle("beta", vec![Step::Ok(STABLE_ANSWER), Step::Ok(STABLE_ANSWER)]),
    ];

    let result = RoundRobinStrategy::new(context(providers, cfg, &dir)).run().await.unwrap();

    assert_eq!(result.rounds.len(), 2);
    assert!(result.convergence_reason.contains("round 2"));
    assert!(result.convergence_reason.contains("0.85"));
    assert!(!result.final_answer.is_empty());
    assert_eq!(result.synthesis.as_ref().unwrap().provider, "alpha");
}

#[tokio::test]
async fn permanent_failure_omits_provider_without_aborting() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&["alpha", "beta", "gamma"]);
    cfg.rounds = 1;

    let providers = vec![
        handle(
            "alpha",
            vec![
                Step::Ok("The sky is blue because of Rayleigh scattering."),
                Step::Ok("## Final Answer\nThe sky is blue because of Rayleigh scattering."),
            ],
        ),
        handle("beta", vec![Step::Ok("Blue light scatters far more than red light does.")]),
        handle("gamma", vec![Step::Fatal("model not found")]),
    ];

    let result = RoundRobinStrategy::new(context(providers, cfg, &dir)).run().await.unwrap();

    let round1 = &result.rounds[0];
    assert_eq!(round1.responses.len(), 2);
    assert!(round1.response_for("gamma").is_none());

    // The failed provider never appears in attribution.
    let report = AttributionAnalyzer::new().analyze(&result);
    assert!(report.providers.iter().all(|p| p.provider != "gamma"));
    assert!(report.providers.iter().any(|p| p.provider == "alpha" && p.contribution > 0.0));
}

#[tokio::test]
async fn synthesis_falls_back_to_next_provider() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&["openai", "anthropic"]);
    cfg.rounds = 1;

    // anthropic leads the default synthesis order and fails; openai
    // must be tried next and win.
    let providers = vec![
        handle("openai", vec![Step::Ok(STABLE_ANSWER), Step::Ok("## Final Answer\nmerged")]),
        handle("anthropic", vec![Step::Ok(STABLE_ANSWER), Step::Fatal("overquota")]),
    ];

    let result = RoundRobinStrategy::new(context(providers, cfg, &dir)).run().await.unwrap();

    assert_eq!(result.synthesis.as_ref().unwrap().provider, "openai");
    assert_eq!(result.final_answer, "merged");
}

#[tokio::test]
async fn synthesis_exhaustion_fails_run_but_keeps_audit() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&["alpha", "beta"]);
    cfg.rounds = 1;

    let providers = vec![
        handle("alpha", vec![Step::Ok(STABLE_ANSWER), Step::Fatal("quota exceeded")]),
        handle("beta", vec![Step::Ok(STABLE_ANSWER), Step::Fatal("bad request")]),
    ];

    let ctx = context(providers, cfg, &dir);
    let base = ctx.writer.base_path().to_path_buf();
    let err = RoundRobinStrategy::new(ctx).run().await.unwrap_err();

    match err {
        DebateError::SynthesisExhausted { cause } => assert!(cause.contains("bad request")),
        other => panic!("expected synthesis exhaustion, got {other}"),
    }

    // Rounds are on disk; the final answer is not.
    assert!(base.join("audit/01-round-1-responses.md").is_file());
    assert!(!base.join("final-answer.md").exists());
}

#[tokio::test]
async fn all_providers_failing_in_round_one_aborts() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&["alpha", "beta"]);

    let providers = vec![
        handle("alpha", vec![Step::Fatal("bad key")]),
        handle("beta", vec![Step::Fatal("bad key")]),
    ];

    let err = RoundRobinStrategy::new(context(providers, cfg, &dir)).run().await.unwrap_err();
    assert!(matches!(err, DebateError::RoundFailed { round: 1, .. }));
}

#[tokio::test]
async fn judge_ruling_is_split_on_heading() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&["alpha", "beta", "delta"]);
    cfg.mode = DebateMode::Judge;
    cfg.judge_provider = Some("delta".to_string());

    let providers = vec![
        handle("alpha", vec![Step::Ok("Answer X is the right choice for this.")]),
        handle("beta", vec![Step::Ok("Answer Y is the right choice for this.")]),
        handle(
            "delta",
            vec![
                Step::Ok("Answer Z could also work in some cases."),
                Step::Ok("reasoning\n## Final Answer\nGo with X."),
            ],
        ),
    ];

    let result = JudgeStrategy::new(context(providers, cfg, &dir)).run().await.unwrap();

    assert_eq!(result.resolution, "reasoning");
    assert_eq!(result.final_answer, "Go with X.");
    assert_eq!(result.rounds.len(), 1);
    assert_eq!(result.synthesis.as_ref().unwrap().provider, "delta");
    assert!(result.convergence_reason.contains("delta"));
}

#[tokio::test]
async fn failed_judge_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&["alpha", "delta"]);
    cfg.mode = DebateMode::Judge;
    cfg.judge_provider = Some("delta".to_string());

    let providers = vec![
        handle("alpha", vec![Step::Ok(STABLE_ANSWER)]),
        handle("delta", vec![Step::Ok(STABLE_ANSWER), Step::Fatal("refused")]),
    ];

    let err = JudgeStrategy::new(context(providers, cfg, &dir)).run().await.unwrap_err();
    assert!(matches!(err, DebateError::JudgeFailed { .. }));
}

#[tokio::test(start_paused = true)]
async fn transient_failure_is_retried_within_a_round() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&["alpha"]);
    cfg.rounds = 1;
    cfg.max_retries = 1;

    let providers = vec![handle(
        "alpha",
        vec![
            Step::Transient("socket dropped"),
            Step::Ok(STABLE_ANSWER),
            Step::Ok("## Final Answer\ndone"),
        ],
    )];

    let result = RoundRobinStrategy::new(context(providers, cfg, &dir)).run().await.unwrap();
    assert_eq!(result.rounds[0].responses.len(), 1);
    assert_eq!(result.final_answer, "done");
}

#[tokio::test]
async fn verbose_mode_streams_and_reports_usage_after_drain() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&["alpha"]);
    cfg.rounds = 1;
    cfg.verbosity = Verbosity::Verbose;

    let providers = vec![handle(
        "alpha",
        vec![Step::Ok(STABLE_ANSWER), Step::Ok("## Final Answer\nstreamed")],
    )];

    let ctx = DebateContext {
        providers,
        renderer: Arc::new(Renderer::new(Verbosity::Verbose)),
        writer: Arc::new(OutputWriter::new(dir.path().to_str().unwrap(), &cfg.prompt).unwrap()),
        config: cfg,
    };

    let result = RoundRobinStrategy::new(ctx).run().await.unwrap();
    let response = &result.rounds[0].responses[0];
    // Chunk concatenation equals the full content.
    assert_eq!(response.content, STABLE_ANSWER);
    // Usage only becomes available once the stream is drained.
    assert_eq!(response.usage, TokenUsage::new(10, 20));
    assert_eq!(result.final_answer, "streamed");
}

#[tokio::test]
async fn single_provider_debate_still_synthesizes() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&["alpha"]);
    cfg.rounds = 2;

    // With no peers there is nothing to critique; rounds 2..R are
    // degenerate and the run goes straight to synthesis.
    let providers = vec![handle(
        "alpha",
        vec![Step::Ok(STABLE_ANSWER), Step::Ok("## Final Answer\nsolo")],
    )];

    let result = RoundRobinStrategy::new(context(providers, cfg, &dir)).run().await.unwrap();
    assert_eq!(result.rounds.len(), 1);
    assert_eq!(result.final_answer, "solo");
    assert!(result.convergence_reason.contains("Maximum rounds"));
}
