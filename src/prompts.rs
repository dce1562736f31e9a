//! Instruction templates and the four-call analysis chain.

use tracing::info;

use crate::gemini::{StepResult, TextGenerator};

/// One step of the analysis chain, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Evaluate,
    Optimize,
    OriginalResponse,
    OptimizedResponse,
}

impl Step {
    /// In-flight label shown in the status bar.
    pub fn label(&self) -> &'static str {
        match self {
            Step::Evaluate => "Evaluating prompt",
            Step::Optimize => "Optimizing prompt",
            Step::OriginalResponse => "Generating original response",
            Step::OptimizedResponse => "Generating optimized response",
        }
    }
}

/// Everything one completed submission produced.
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub evaluation: StepResult,
    pub optimized_prompt: StepResult,
    pub original_response: StepResult,
    pub optimized_response: StepResult,
}

/// Builds the scoring instruction wrapped around the user's prompt.
pub fn evaluation_instruction(prompt: &str) -> String {
    format!(
        "Evaluate this prompt based on: \
         1. Clarity (1-10), 2. Conciseness (1-10), 3. Specificity (1-10), 4. Relevance (1-10). \
         Provide a numerical score for each category.\nPrompt: {}",
        prompt
    )
}

/// Builds the rewrite instruction wrapped around the user's prompt.
pub fn optimization_instruction(prompt: &str) -> String {
    format!(
        "Rewrite this prompt to be clearer, more concise, and more specific \
         while keeping the original intent.\nOriginal Prompt: {}",
        prompt
    )
}

pub fn evaluate(generator: &dyn TextGenerator, prompt: &str) -> StepResult {
    generator.generate(&evaluation_instruction(prompt))
}

pub fn optimize(generator: &dyn TextGenerator, prompt: &str) -> StepResult {
    generator.generate(&optimization_instruction(prompt))
}

/// Plain completion: the prompt goes out verbatim, no template.
pub fn complete(generator: &dyn TextGenerator, prompt: &str) -> StepResult {
    generator.generate(prompt)
}

/// Runs the fixed sequence: evaluate, optimize, complete the original prompt,
/// complete the optimized prompt.
///
/// Every step always runs. A failed step contributes its sentinel text to the
/// outcome, and the optimize step's text — sentinel or not — is what gets sent
/// as the final completion's input. `on_step` fires before each call.
pub fn run_chain(
    generator: &dyn TextGenerator,
    prompt: &str,
    mut on_step: impl FnMut(Step),
) -> ChainOutcome {
    on_step(Step::Evaluate);
    let evaluation = evaluate(generator, prompt);

    on_step(Step::Optimize);
    let optimized_prompt = optimize(generator, prompt);

    on_step(Step::OriginalResponse);
    let original_response = complete(generator, prompt);

    on_step(Step::OptimizedResponse);
    let optimized_response = complete(generator, &optimized_prompt.text);

    let failed_steps = [
        &evaluation,
        &optimized_prompt,
        &original_response,
        &optimized_response,
    ]
    .iter()
    .filter(|r| r.error.is_some())
    .count();

    info!(failed_steps, "chain_complete");

    ChainOutcome {
        evaluation,
        optimized_prompt,
        original_response,
        optimized_response,
    }
}
