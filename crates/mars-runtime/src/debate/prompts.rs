//! Prompt templates for the debate phases.
//!
//! Four shapes: the initial answer, the critique (round >= 2), the
//! synthesis, and the judgment. The `## Final Answer` heading is the
//! sole in-band separator; strategies split responses on its first
//! occurrence.

use mars_core::{LlmResponse, Message};

/// Heading that separates resolution reasoning from the final answer.
/// Matched case-sensitively on the first occurrence.
pub const FINAL_ANSWER_HEADING: &str = "## Final Answer";

pub const SYSTEM_CONTEXT_TEMPLATE: &str = "You are participating in a structured debate. \
The user's prompt includes context that is essential to the task. Treat the context \
as primary source material - reference it directly, address its specifics, and ensure \
your answer covers every requirement stated in both the context and prompt.\n\nCONTEXT:\n";

pub const CRITIQUE_INSTRUCTIONS: &str = "\nIMPORTANT: Re-read the original prompt and context above carefully. \
For each specific question or requirement in the original prompt, evaluate whether \
the other models addressed it adequately.\n\n\
1. Identify specific points where other answers are wrong, incomplete, or miss \
requirements from the original prompt.\n\
2. Identify what they got right that your answer missed.\n\
3. Call out where any answer (including yours) replaced concrete data from the \
original prompt with vague generalities.\n\
4. Provide your COMPLETE improved answer that addresses ALL requirements from the \
original prompt, incorporating valid points from others while correcting errors.\n\n\
When the prompt asks for examples, give CONCRETE examples using real data from the \
context - not generic placeholders. When it asks for code, prompts, or schemas, \
provide complete, usable output. Do not summarize or shorten - give a full, \
detailed answer.";

pub const EVALUATION_RULES: &str = "CRITICAL RULES:\n\
- Address EVERY numbered question or requirement in the original prompt.\n\
- When the prompt asks for examples, provide CONCRETE examples with real data, \
names, numbers, and specifics - not generic placeholders.\n\
- When the prompt or context mentions specific data (names, numbers, scores, \
versions), use that exact data in your answer.\n\
- When the prompt asks for code, prompts, schemas, or configs, provide complete, \
copy-pasteable output - not descriptions of what it would look like.\n\
- Prefer the most specific and detailed version of any point across the models. \
Never abstract a concrete example into a vague summary.\n\
- If models disagree, pick the version with the strongest reasoning and most \
specificity.\n\n\
Structure your response in two sections:\n\n\
## Resolution Analysis\n\
For each model, list which specific points you accepted and which you rejected, \
with reasoning tied to the original requirements.\n\n\
## Final Answer\n\
Provide the complete synthesized answer. Match the level of detail and specificity \
the original prompt demands.";

pub const SYNTHESIS_PREAMBLE: &str = "\nSynthesize the best possible answer from all \
models' responses. Re-read the original prompt and context above carefully.\n\n";

pub const JUDGE_PREAMBLE: &str = "\nYou are the judge. Re-read the original prompt and \
context above carefully. Evaluate each response against EVERY specific requirement in \
the original prompt.\n\n";

/// The complete user-visible prompt: labelled context blocks followed
/// by the original prompt.
pub fn full_prompt_with_context(prompt: &str, context: &[String]) -> String {
    let mut parts = Vec::new();
    if !context.is_empty() {
        parts.push("=== CONTEXT ===".to_string());
        for (i, ctx) in context.iter().enumerate() {
            if context.len() > 1 {
                parts.push(format!("\n--- Context {} ---", i + 1));
            }
            parts.push(ctx.clone());
        }
        parts.push("\n=== END CONTEXT ===\n".to_string());
    }
    parts.push(format!("ORIGINAL PROMPT: {prompt}"));
    parts.join("\n")
}

/// Context-bearing system message, or `None` without context.
pub fn build_system(context: &[String]) -> Option<Message> {
    if context.is_empty() {
        return None;
    }
    let joined = context.join("\n\n---\n\n");
    Some(Message::system(format!("{SYSTEM_CONTEXT_TEMPLATE}{joined}")))
}

fn with_system(system: Option<Message>, user: String) -> Vec<Message> {
    match system {
        Some(system) => vec![system, Message::user(user)],
        None => vec![Message::user(user)],
    }
}

/// Messages for the initial round.
pub fn initial_messages(prompt: &str, context: &[String]) -> Vec<Message> {
    with_system(build_system(context), full_prompt_with_context(prompt, context))
}

/// Messages for one participant's critique round.
///
/// The participant sees its own previous answer, every peer's answer
/// labelled by participant ID, and the critique instructions.
pub fn critique_messages(
    prompt: &str,
    context: &[String],
    own: &LlmResponse,
    others: &[&LlmResponse],
) -> Vec<Message> {
    let mut parts = vec![full_prompt_with_context(prompt, context)];
    parts.push(format!("\n---\n\nYour previous answer:\n{}\n", own.content));
    parts.push("\nOther models' answers:\n".to_string());
    for other in others {
        parts.push(format!("--- {} ---\n{}\n", other.provider, other.content));
    }
    parts.push(CRITIQUE_INSTRUCTIONS.to_string());
    with_system(build_system(context), parts.join("\n"))
}

fn answers_block(answers: &[&LlmResponse]) -> String {
    answers
        .iter()
        .map(|r| format!("--- {} ({}) ---\n{}\n", r.provider, r.model, r.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Messages for the synthesis call over all latest answers.
pub fn synthesis_messages(
    prompt: &str,
    context: &[String],
    answers: &[&LlmResponse],
) -> Vec<Message> {
    let body = format!(
        "{}\n\n---\n\nFinal answers from each model after debate:\n\n{}\n{}{}",
        full_prompt_with_context(prompt, context),
        answers_block(answers),
        SYNTHESIS_PREAMBLE,
        EVALUATION_RULES,
    );
    with_system(build_system(context), body)
}

/// Messages for the judge call over all initial answers.
pub fn judge_messages(
    prompt: &str,
    context: &[String],
    answers: &[&LlmResponse],
) -> Vec<Message> {
    let body = format!(
        "{}\n\n---\n\nResponses from each model:\n\n{}\n{}{}",
        full_prompt_with_context(prompt, context),
        answers_block(answers),
        JUDGE_PREAMBLE,
        EVALUATION_RULES,
    );
    with_system(build_system(context), body)
}

/// Split content on the first `## Final Answer` heading into
/// `(final_answer, resolution)`. Without the heading the whole content
/// is the final answer and the resolution is empty.
pub fn split_final_answer(content: &str) -> (String, String) {
    match content.split_once(FINAL_ANSWER_HEADING) {
        Some((before, after)) => (after.trim().to_string(), before.trim().to_string()),
        None => (content.trim().to_string(), String::new()),
    }
}
