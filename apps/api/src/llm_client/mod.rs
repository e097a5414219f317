/// LLM Client — the single point of entry for all generative-model calls in Outreach.
///
/// ARCHITECTURAL RULE: No other module may call a model provider directly.
/// Extraction and composition depend only on the `TextGenerator` trait.
///
/// Retries belong here (transport layer): 429 / 5xx / connection errors are retried with
/// exponential backoff. Callers never retry.
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Default model per provider. Overridable with `LLM_MODEL`.
pub const ANTHROPIC_DEFAULT_MODEL: &str = "claude-sonnet-4-5";
pub const GROQ_DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

const MAX_TOKENS: u32 = 4096;
const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Capability interface over a generative model: prompt in, free-form text out.
///
/// Tests substitute deterministic stubs; production uses `LlmClient`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Which hosted API the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Anthropic,
    /// OpenAI-compatible chat completions endpoint.
    Groq,
}

impl LlmProvider {
    pub fn default_model(self) -> &'static str {
        match self {
            LlmProvider::Anthropic => ANTHROPIC_DEFAULT_MODEL,
            LlmProvider::Groq => GROQ_DEFAULT_MODEL,
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn api_key_var(self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::Groq => "GROQ_API_KEY",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(LlmProvider::Anthropic),
            "groq" => Ok(LlmProvider::Groq),
            other => Err(format!("unknown LLM provider '{other}' (expected anthropic|groq)")),
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::Anthropic => write!(f, "anthropic"),
            LlmProvider::Groq => write!(f, "groq"),
        }
    }
}

// ── Anthropic Messages API ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicResponse {
    /// Extracts the text content from the first text block.
    fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: ApiErrorBody,
}

// ── OpenAI-compatible chat completions (Groq) ───────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// The single LLM client used by all services in Outreach.
/// Wraps either the Anthropic Messages API or an OpenAI-compatible endpoint, with retry logic.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    provider: LlmProvider,
    model: String,
}

impl LlmClient {
    pub fn new(provider: LlmProvider, api_key: String, model: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            provider,
            model: model.unwrap_or_else(|| provider.default_model().to_string()),
        }
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, prompt: &str, system: &str) -> reqwest::RequestBuilder {
        match self.provider {
            LlmProvider::Anthropic => self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&AnthropicRequest {
                    model: &self.model,
                    max_tokens: MAX_TOKENS,
                    temperature: 0.0,
                    system,
                    messages: vec![ChatMessage {
                        role: "user",
                        content: prompt,
                    }],
                }),
            LlmProvider::Groq => self
                .client
                .post(GROQ_API_URL)
                .bearer_auth(&self.api_key)
                .json(&ChatRequest {
                    model: &self.model,
                    max_tokens: MAX_TOKENS,
                    temperature: 0.0,
                    messages: vec![
                        ChatMessage {
                            role: "system",
                            content: system,
                        },
                        ChatMessage {
                            role: "user",
                            content: prompt,
                        },
                    ],
                }),
        }
    }

    /// Makes a call to the configured provider and returns the text of the reply.
    /// Retries on 429 (rate limit), 5xx and connection errors with exponential backoff.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.request(prompt, system).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: api_error_message(self.provider, body),
                });
            }

            let text = match self.provider {
                LlmProvider::Anthropic => {
                    let parsed: AnthropicResponse = response.json().await?;
                    debug!(
                        "LLM call succeeded: input_tokens={}, output_tokens={}",
                        parsed.usage.input_tokens, parsed.usage.output_tokens
                    );
                    parsed.text().map(str::to_string)
                }
                LlmProvider::Groq => {
                    let parsed: ChatResponse = response.json().await?;
                    if let Some(usage) = &parsed.usage {
                        debug!(
                            "LLM call succeeded: input_tokens={}, output_tokens={}",
                            usage.prompt_tokens, usage.completion_tokens
                        );
                    }
                    parsed
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.message.content)
                }
            };

            return match text {
                Some(t) if !t.trim().is_empty() => Ok(t),
                _ => Err(LlmError::EmptyContent),
            };
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.call(prompt, prompts::PLAIN_ASSISTANT_SYSTEM).await
    }
}

/// Pulls the human-readable message out of a provider error body, falling back to the raw body.
fn api_error_message(provider: LlmProvider, body: String) -> String {
    let parsed = match provider {
        LlmProvider::Anthropic => serde_json::from_str::<AnthropicError>(&body).map(|e| e.error),
        LlmProvider::Groq => serde_json::from_str::<OpenAiError>(&body).map(|e| e.error),
    };
    parsed.map(|e| e.message).unwrap_or(body)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
/// The `json` tag is matched case-insensitively.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = match rest.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
        _ => rest,
    };
    let rest = rest.trim_start();
    rest.strip_suffix("```").map(str::trim).unwrap_or(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n[{\"role\": \"Engineer\"}]\n```";
        assert_eq!(strip_json_fences(input), "[{\"role\": \"Engineer\"}]");
    }

    #[test]
    fn test_strip_json_fences_tag_is_case_insensitive() {
        let input = "```JSON\n[{\"role\": \"A\"}]\n```";
        assert_eq!(strip_json_fences(input), "[{\"role\": \"A\"}]");
        assert_eq!(strip_json_fences("```Json {\"role\": \"A\"}```"), "{\"role\": \"A\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"role\": \"Engineer\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"role\": \"Engineer\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "  {\"role\": \"Engineer\"}\n";
        assert_eq!(strip_json_fences(input), "{\"role\": \"Engineer\"}");
    }

    #[test]
    fn test_strip_json_fences_unterminated() {
        let input = "```json\n[1, 2]";
        assert_eq!(strip_json_fences(input), "[1, 2]");
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("Groq".parse::<LlmProvider>().unwrap(), LlmProvider::Groq);
        assert_eq!(
            " anthropic ".parse::<LlmProvider>().unwrap(),
            LlmProvider::Anthropic
        );
        assert!("openai".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn test_client_uses_provider_default_model() {
        let client = LlmClient::new(LlmProvider::Groq, "key".to_string(), None);
        assert_eq!(client.model(), GROQ_DEFAULT_MODEL);
        let client = LlmClient::new(
            LlmProvider::Anthropic,
            "key".to_string(),
            Some("claude-custom".to_string()),
        );
        assert_eq!(client.model(), "claude-custom");
    }

    #[test]
    fn test_anthropic_response_text_skips_non_text_blocks() {
        let json = r#"{
            "content": [
                {"type": "tool_use", "text": null},
                {"type": "text", "text": "Dear Hiring Manager"}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 4}
        }"#;
        let parsed: AnthropicResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.text(), Some("Dear Hiring Manager"));
    }

    #[test]
    fn test_chat_response_deserializes_without_usage() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": "Hi"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.usage.is_none());
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_api_error_message_parses_provider_body() {
        let body = r#"{"error": {"message": "invalid api key", "type": "auth"}}"#.to_string();
        assert_eq!(
            api_error_message(LlmProvider::Groq, body.clone()),
            "invalid api key"
        );
        assert_eq!(
            api_error_message(LlmProvider::Anthropic, "not json".to_string()),
            "not json"
        );
    }
}
