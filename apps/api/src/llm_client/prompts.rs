// Shared system prompts.
// Each service that needs LLM calls defines its own prompts.rs alongside it.

/// System prompt sent with every `TextGenerator::generate` call.
/// Task-specific instructions live in the user prompt templates.
pub const PLAIN_ASSISTANT_SYSTEM: &str = "You are a precise assistant. \
    Follow the output instructions in the prompt exactly. \
    Do NOT add a preamble, explanations or apologies.";
