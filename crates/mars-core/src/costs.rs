//! Token aggregation and USD cost estimation.

use serde::{Deserialize, Serialize};

use crate::models::{DebateResult, LlmResponse};

/// Pricing per 1M tokens: (input, output) in USD.
///
/// Approximate as of early 2025. Ollama models are local and free, so
/// they fall through the lookup and cost nothing.
const MODEL_PRICING: &[(&str, (f64, f64))] = &[
    // OpenAI
    ("gpt-4o", (2.50, 10.00)),
    ("gpt-4o-mini", (0.15, 0.60)),
    ("gpt-4.1", (2.00, 8.00)),
    ("gpt-4.1-mini", (0.40, 1.60)),
    ("gpt-4.1-nano", (0.10, 0.40)),
    ("o3", (2.00, 8.00)),
    ("o3-mini", (1.10, 4.40)),
    ("o4-mini", (1.10, 4.40)),
    // Anthropic
    ("claude-opus-4", (15.00, 75.00)),
    ("claude-sonnet-4", (3.00, 15.00)),
    ("claude-haiku-3", (0.25, 1.25)),
    // Google
    ("gemini-2.0-flash", (0.10, 0.40)),
    ("gemini-2.5-pro", (1.25, 10.00)),
    ("gemini-2.5-flash", (0.15, 0.60)),
];

/// Find pricing for a model by longest prefix match.
fn lookup_price(model: &str) -> Option<(f64, f64)> {
    MODEL_PRICING
        .iter()
        .filter(|(prefix, _)| model.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, price)| *price)
}

/// Token and cost totals for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCost {
    pub provider: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    /// This provider's fraction of the run's total cost, in [0, 1];
    /// 0 when the total is 0.
    pub share_of_total: f64,
}

/// Cost report for one debate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostReport {
    pub providers: Vec<ProviderCost>,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cost: f64,
    /// Models with no pricing entry; their responses cost 0.
    pub warnings: Vec<String>,
}

/// Sum token usage per provider across all rounds plus the
/// synthesis/judge response, and price it.
pub fn compute_costs(result: &DebateResult) -> CostReport {
    struct Totals {
        provider: String,
        model: String,
        input_tokens: u64,
        output_tokens: u64,
    }

    let mut totals: Vec<Totals> = Vec::new();
    let mut accumulate = |response: &LlmResponse| {
        let entry = totals.iter().position(|t| t.provider == response.provider);
        let idx = entry.unwrap_or_else(|| {
            totals.push(Totals {
                provider: response.provider.clone(),
                model: response.model.clone(),
                input_tokens: 0,
                output_tokens: 0,
            });
            totals.len() - 1
        });
        totals[idx].input_tokens += response.usage.input_tokens;
        totals[idx].output_tokens += response.usage.output_tokens;
    };

    for round in &result.rounds {
        for response in &round.responses {
            accumulate(response);
        }
    }
    if let Some(synthesis) = &result.synthesis {
        accumulate(synthesis);
    }

    let mut providers = Vec::with_capacity(totals.len());
    let mut warnings = Vec::new();
    let mut total_input = 0u64;
    let mut total_output = 0u64;
    let mut total_cost = 0.0f64;

    for t in &totals {
        let (input_rate, output_rate) = match lookup_price(&t.model) {
            Some(rates) => rates,
            None => {
                warnings.push(format!(
                    "no pricing for model '{}' ({}); counted as $0",
                    t.model, t.provider
                ));
                (0.0, 0.0)
            }
        };
        let input_cost = t.input_tokens as f64 / 1_000_000.0 * input_rate;
        let output_cost = t.output_tokens as f64 / 1_000_000.0 * output_rate;

        providers.push(ProviderCost {
            provider: t.provider.clone(),
            model: t.model.clone(),
            input_tokens: t.input_tokens,
            output_tokens: t.output_tokens,
            total_tokens: t.input_tokens + t.output_tokens,
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
            share_of_total: 0.0,
        });
        total_input += t.input_tokens;
        total_output += t.output_tokens;
        total_cost += input_cost + output_cost;
    }

    if total_cost > 0.0 {
        for pc in &mut providers {
            pc.share_of_total = pc.total_cost / total_cost;
        }
    }

    CostReport {
        providers,
        total_input_tokens: total_input,
        total_output_tokens: total_output,
        total_cost,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DebateMode, DebateRound, LlmResponse, TokenUsage};

    fn response(provider: &str, model: &str, input: u64, output: u64) -> LlmResponse {
        LlmResponse {
            provider: provider.to_string(),
            model: model.to_string(),
            content: String::new(),
            usage: TokenUsage::new(input, output),
        }
    }

    fn result_with(responses: Vec<LlmResponse>, synthesis: Option<LlmResponse>) -> DebateResult {
        let mut result = DebateResult::new("p", Vec::new(), DebateMode::RoundRobin);
        let mut round = DebateRound::new(1);
        round.responses = responses;
        result.rounds.push(round);
        result.synthesis = synthesis;
        result
    }

    #[test]
    fn test_longest_prefix_wins() {
        // "gpt-4.1-mini-2025..." must match gpt-4.1-mini, not gpt-4.1.
        assert_eq!(lookup_price("gpt-4.1-mini-2025-04-14"), Some((0.40, 1.60)));
        assert_eq!(lookup_price("gpt-4.1-2025-04-14"), Some((2.00, 8.00)));
        assert_eq!(lookup_price("claude-sonnet-4-20250514"), Some((3.00, 15.00)));
        assert_eq!(lookup_price("llama3.2"), None);
    }

    #[test]
    fn test_cost_arithmetic() {
        let result = result_with(
            vec![response("openai", "gpt-4o", 1_000_000, 500_000)],
            None,
        );
        let report = compute_costs(&result);
        let pc = &report.providers[0];
        assert!((pc.input_cost - 2.50).abs() < 1e-9);
        assert!((pc.output_cost - 5.00).abs() < 1e-9);
        assert!((pc.total_cost - 7.50).abs() < 1e-9);
        assert!((pc.share_of_total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_shares_sum_to_one() {
        let result = result_with(
            vec![
                response("openai", "gpt-4o", 100_000, 50_000),
                response("anthropic", "claude-sonnet-4-20250514", 200_000, 80_000),
                response("google", "gemini-2.0-flash", 300_000, 10_000),
            ],
            Some(response("anthropic", "claude-sonnet-4-20250514", 50_000, 20_000)),
        );
        let report = compute_costs(&result);
        let sum: f64 = report.providers.iter().map(|p| p.share_of_total).sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_synthesis_usage_counted_once() {
        let result = result_with(
            vec![response("openai", "gpt-4o", 100, 100)],
            Some(response("openai", "gpt-4o", 50, 50)),
        );
        let report = compute_costs(&result);
        assert_eq!(report.providers.len(), 1);
        assert_eq!(report.providers[0].input_tokens, 150);
        assert_eq!(report.providers[0].output_tokens, 150);
    }

    #[test]
    fn test_unknown_model_warns_and_costs_zero() {
        let result = result_with(vec![response("ollama", "llama3.2", 1000, 1000)], None);
        let report = compute_costs(&result);
        assert_eq!(report.providers[0].total_cost, 0.0);
        assert_eq!(report.providers[0].share_of_total, 0.0);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("llama3.2"));
    }

    #[test]
    fn test_empty_result() {
        let result = DebateResult::new("p", Vec::new(), DebateMode::RoundRobin);
        let report = compute_costs(&result);
        assert!(report.providers.is_empty());
        assert_eq!(report.total_cost, 0.0);
    }
}
