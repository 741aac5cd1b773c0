//! Sentence-level attribution over a finished debate.
//!
//! Every metric is derived purely from the transcript: which provider
//! each final-answer sentence traces back to (contribution), how much
//! of each provider's opening answer survived (survival), how often
//! peers adopted a provider's sentences in later rounds (influence),
//! and how each provider's answer changed round over round (diffs).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::DebateResult;
use crate::similarity::{ratio, sentence_ratio, split_sentences};

/// Similarity floor for declaring one sentence a match of another.
/// Distinct from the convergence threshold.
pub const ATTRIBUTION_THRESHOLD: f64 = 0.6;

/// Per-provider attribution metrics, all in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAttribution {
    pub provider: String,
    pub model: String,
    /// Fraction of final-answer sentences whose best match traces here.
    pub contribution: f64,
    pub contributed_sentences: usize,
    pub total_final_sentences: usize,
    /// Fraction of this provider's round-1 sentences present in the
    /// final answer.
    pub survival: f64,
    pub survived_sentences: usize,
    pub initial_sentences: usize,
    /// Fraction of this provider's sentences adopted by peers in the
    /// following round.
    pub influence: f64,
    /// Per-peer adoption fractions backing `influence`.
    pub influence_details: BTreeMap<String, f64>,
}

/// Sentence-level change between two consecutive rounds of one
/// provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundDiff {
    pub provider: String,
    pub from_round: u32,
    pub to_round: u32,
    /// Whole-text similarity of the two rounds' sentence lists.
    pub similarity: f64,
    pub sentences_added: usize,
    pub sentences_removed: usize,
    pub sentences_unchanged: usize,
}

/// Full attribution report for one debate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionReport {
    /// One entry per provider, in registration order.
    pub providers: Vec<ProviderAttribution>,
    pub attribution_threshold: f64,
    pub final_sentence_count: usize,
    /// Final-answer sentences with no match >= threshold anywhere in
    /// the transcript.
    pub novel_sentences: usize,
    /// `novel_sentences / final_sentence_count`; with the provider
    /// contributions this sums to 1.0 when the final answer has
    /// sentences.
    pub novel_in_synthesis: f64,
    pub round_diffs: Vec<RoundDiff>,
}

/// One provider's sentences, bucketed by round.
struct ProviderText {
    provider: String,
    model: String,
    rounds: BTreeMap<u32, Vec<String>>,
}

impl ProviderText {
    fn sentences_in(&self, round: u32) -> &[String] {
        self.rounds.get(&round).map(Vec::as_slice).unwrap_or(&[])
    }

    fn total_sentences(&self) -> usize {
        self.rounds.values().map(Vec::len).sum()
    }
}

fn best_score(sentence: &str, candidates: &[String]) -> f64 {
    candidates
        .iter()
        .map(|c| sentence_ratio(sentence, c))
        .fold(0.0, f64::max)
}

/// Computes [`AttributionReport`]s from debate transcripts.
pub struct AttributionAnalyzer {
    threshold: f64,
}

impl Default for AttributionAnalyzer {
    fn default() -> Self {
        Self { threshold: ATTRIBUTION_THRESHOLD }
    }
}

impl AttributionAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyze a finished debate.
    pub fn analyze(&self, result: &DebateResult) -> AttributionReport {
        let providers = extract_provider_text(result);
        let final_sentences = split_sentences(&result.final_answer);

        let contributed = self.attribute_final_sentences(&final_sentences, &providers);
        let novel = final_sentences.len() - contributed.iter().sum::<usize>();

        let mut attributions = Vec::with_capacity(providers.len());
        for (idx, data) in providers.iter().enumerate() {
            let (survival, survived, initial) = self.survival(&final_sentences, data);
            let (influence, influence_details) = self.influence(idx, &providers);

            let contribution = if final_sentences.is_empty() {
                0.0
            } else {
                contributed[idx] as f64 / final_sentences.len() as f64
            };

            attributions.push(ProviderAttribution {
                provider: data.provider.clone(),
                model: data.model.clone(),
                contribution,
                contributed_sentences: contributed[idx],
                total_final_sentences: final_sentences.len(),
                survival,
                survived_sentences: survived,
                initial_sentences: initial,
                influence,
                influence_details,
            });
        }

        let novel_in_synthesis = if final_sentences.is_empty() {
            0.0
        } else {
            novel as f64 / final_sentences.len() as f64
        };

        AttributionReport {
            providers: attributions,
            attribution_threshold: self.threshold,
            final_sentence_count: final_sentences.len(),
            novel_sentences: novel,
            novel_in_synthesis,
            round_diffs: self.round_diffs(&providers),
        }
    }

    /// Attribute each final-answer sentence to the provider with the
    /// best match >= threshold, or to no one.
    ///
    /// Ties go to the earliest registered provider via the
    /// strictly-greater comparison.
    fn attribute_final_sentences(
        &self,
        final_sentences: &[String],
        providers: &[ProviderText],
    ) -> Vec<usize> {
        let mut counts = vec![0usize; providers.len()];
        for sentence in final_sentences {
            let mut best_provider = None;
            let mut best = 0.0;
            for (idx, data) in providers.iter().enumerate() {
                for candidates in data.rounds.values() {
                    let score = best_score(sentence, candidates);
                    if score > best {
                        best = score;
                        best_provider = Some(idx);
                    }
                }
            }
            if best >= self.threshold {
                if let Some(idx) = best_provider {
                    counts[idx] += 1;
                }
            }
        }
        counts
    }

    fn survival(&self, final_sentences: &[String], data: &ProviderText) -> (f64, usize, usize) {
        let round1 = data.sentences_in(1);
        if round1.is_empty() {
            return (0.0, 0, 0);
        }
        let survived = round1
            .iter()
            .filter(|s| best_score(s, final_sentences) >= self.threshold)
            .count();
        (survived as f64 / round1.len() as f64, survived, round1.len())
    }

    /// Sentences of this provider adopted by a peer in the following
    /// round, over the provider's sentence count across all rounds.
    fn influence(&self, idx: usize, providers: &[ProviderText]) -> (f64, BTreeMap<String, f64>) {
        let data = &providers[idx];
        let total = data.total_sentences();
        if total == 0 || providers.len() < 2 {
            return (0.0, BTreeMap::new());
        }

        let mut adopted_by: BTreeMap<String, usize> = BTreeMap::new();
        let mut adopted_total = 0usize;

        for (&round, sentences) in &data.rounds {
            for (other_idx, other) in providers.iter().enumerate() {
                if other_idx == idx {
                    continue;
                }
                let next = other.sentences_in(round + 1);
                if next.is_empty() {
                    continue;
                }
                let curr = other.sentences_in(round);
                for sentence in sentences {
                    if best_score(sentence, next) >= self.threshold
                        && best_score(sentence, curr) < self.threshold
                    {
                        *adopted_by.entry(other.provider.clone()).or_default() += 1;
                        adopted_total += 1;
                    }
                }
            }
        }

        let details = adopted_by
            .into_iter()
            .map(|(name, count)| (name, count as f64 / total as f64))
            .collect();
        let influence = (adopted_total as f64 / total as f64).clamp(0.0, 1.0);
        (influence, details)
    }

    /// Diff each provider's consecutive rounds.
    ///
    /// Matching is one-to-one (each `to`-round sentence is consumed at
    /// most once) so that `unchanged + removed = |from|` and
    /// `unchanged + added = |to|` both hold.
    fn round_diffs(&self, providers: &[ProviderText]) -> Vec<RoundDiff> {
        let mut diffs = Vec::new();
        for data in providers {
            let rounds: Vec<_> = data.rounds.iter().collect();
            for pair in rounds.windows(2) {
                let (&from_round, from) = pair[0];
                let (&to_round, to) = pair[1];

                let mut used = vec![false; to.len()];
                let mut unchanged = 0usize;
                for sentence in from {
                    let mut best_idx = None;
                    let mut best = 0.0;
                    for (j, cand) in to.iter().enumerate() {
                        if used[j] {
                            continue;
                        }
                        let score = sentence_ratio(sentence, cand);
                        if score > best {
                            best = score;
                            best_idx = Some(j);
                        }
                    }
                    if best >= self.threshold {
                        if let Some(j) = best_idx {
                            used[j] = true;
                            unchanged += 1;
                        }
                    }
                }

                diffs.push(RoundDiff {
                    provider: data.provider.clone(),
                    from_round,
                    to_round,
                    similarity: ratio(&from.join("\n"), &to.join("\n")),
                    sentences_added: to.len() - unchanged,
                    sentences_removed: from.len() - unchanged,
                    sentences_unchanged: unchanged,
                });
            }
        }
        diffs
    }
}

/// Bucket each provider's sentences by round, preserving first
/// appearance order (which matches registration order).
fn extract_provider_text(result: &DebateResult) -> Vec<ProviderText> {
    let mut providers: Vec<ProviderText> = Vec::new();
    for round in &result.rounds {
        for response in &round.responses {
            let idx = providers
                .iter()
                .position(|p| p.provider == response.provider)
                .unwrap_or_else(|| {
                    providers.push(ProviderText {
                        provider: response.provider.clone(),
                        model: response.model.clone(),
                        rounds: BTreeMap::new(),
                    });
                    providers.len() - 1
                });
            providers[idx]
                .rounds
                .insert(round.round_number, split_sentences(&response.content));
        }
    }
    providers
}
