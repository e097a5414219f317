// Outreach generation: job extraction, portfolio matching, email composition.
// All LLM calls go through llm_client — no direct provider calls here.

pub mod composer;
pub mod extractor;
pub mod handlers;
pub mod pipeline;
pub mod prompts;
