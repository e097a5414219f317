use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

use crate::generation::composer::{ComposerKind, SenderProfile};
use crate::generation::pipeline::{PipelineSettings, DEFAULT_COMPOSE_CONCURRENCY};
use crate::llm_client::LlmProvider;
use crate::portfolio::embedding::DEFAULT_DIMENSIONS;
use crate::portfolio::DEFAULT_TOP_K;

/// Which embedding backend the portfolio index uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProvider {
    Hash,
    OpenAi,
}

impl FromStr for EmbeddingProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hash" => Ok(EmbeddingProvider::Hash),
            "openai" => Ok(EmbeddingProvider::OpenAi),
            other => Err(format!("unknown embedding provider '{other}' (expected hash|openai)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub dimensions: usize,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_provider: LlmProvider,
    pub llm_api_key: String,
    pub llm_model: Option<String>,
    /// Absent: the portfolio index lives in memory and is rebuilt on every start.
    pub database_url: Option<String>,
    pub portfolio_csv: PathBuf,
    pub portfolio_collection: String,
    pub embedding: EmbeddingConfig,
    pub composer: ComposerKind,
    pub sender: SenderProfile,
    pub top_k: usize,
    pub compose_concurrency: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup (the process environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
        };

        let llm_provider: LlmProvider = parse_or(&var, "LLM_PROVIDER", LlmProvider::Groq)?;
        let llm_api_key = require(llm_provider.api_key_var())?;

        let embedding_provider = parse_or(&var, "EMBEDDING_PROVIDER", EmbeddingProvider::Hash)?;
        let embedding = EmbeddingConfig {
            provider: embedding_provider,
            dimensions: parse_or(&var, "EMBEDDING_DIMENSIONS", DEFAULT_DIMENSIONS)?,
            model: var("EMBEDDING_MODEL").unwrap_or_else(|| "text-embedding-3-small".to_string()),
            api_key: match embedding_provider {
                EmbeddingProvider::OpenAi => Some(require("OPENAI_API_KEY")?),
                EmbeddingProvider::Hash => None,
            },
            base_url: var("EMBEDDING_BASE_URL"),
        };
        if embedding.dimensions == 0 {
            return Err(anyhow!("EMBEDDING_DIMENSIONS must be greater than zero"));
        }

        let defaults = SenderProfile::default();
        let sender = SenderProfile {
            name: var("SENDER_NAME").unwrap_or(defaults.name),
            title: var("SENDER_TITLE").unwrap_or(defaults.title),
            company: var("COMPANY_NAME").unwrap_or(defaults.company),
            pitch: var("COMPANY_PITCH").unwrap_or(defaults.pitch),
        };

        Ok(Config {
            llm_provider,
            llm_api_key,
            llm_model: var("LLM_MODEL"),
            database_url: var("DATABASE_URL"),
            portfolio_csv: PathBuf::from(
                var("PORTFOLIO_CSV").unwrap_or_else(|| "my_portfolio.csv".to_string()),
            ),
            portfolio_collection: var("PORTFOLIO_COLLECTION")
                .unwrap_or_else(|| "portfolio".to_string()),
            embedding,
            composer: parse_or(&var, "EMAIL_COMPOSER", ComposerKind::Llm)?,
            sender,
            top_k: parse_or(&var, "PORTFOLIO_TOP_K", DEFAULT_TOP_K)?,
            compose_concurrency: parse_or(
                &var,
                "COMPOSE_CONCURRENCY",
                DEFAULT_COMPOSE_CONCURRENCY,
            )?,
            port: parse_or(&var, "PORT", 8080)?,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            top_k: self.top_k,
            compose_concurrency: self.compose_concurrency.max(1),
        }
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{key} is invalid ('{raw}'): {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_with_groq_key() {
        let config = config_from(&[("GROQ_API_KEY", "gsk_test")]).unwrap();
        assert_eq!(config.llm_provider, LlmProvider::Groq);
        assert_eq!(config.llm_api_key, "gsk_test");
        assert!(config.database_url.is_none());
        assert_eq!(config.portfolio_csv, PathBuf::from("my_portfolio.csv"));
        assert_eq!(config.portfolio_collection, "portfolio");
        assert_eq!(config.embedding.provider, EmbeddingProvider::Hash);
        assert_eq!(config.embedding.dimensions, DEFAULT_DIMENSIONS);
        assert_eq!(config.composer, ComposerKind::Llm);
        assert_eq!(config.top_k, 2);
        assert_eq!(config.compose_concurrency, 4);
        assert_eq!(config.port, 8080);
        assert_eq!(config.sender.company, "XYZ Company");
    }

    #[test]
    fn test_missing_provider_key_fails() {
        let err = config_from(&[]).unwrap_err();
        assert!(err.to_string().contains("GROQ_API_KEY"));

        let err = config_from(&[("LLM_PROVIDER", "anthropic"), ("GROQ_API_KEY", "x")]).unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        let config = config_from(&[("GROQ_API_KEY", "k"), ("DATABASE_URL", "  ")]).unwrap();
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_invalid_numbers_fail() {
        let err = config_from(&[("GROQ_API_KEY", "k"), ("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT is invalid"));

        let err = config_from(&[("GROQ_API_KEY", "k"), ("EMBEDDING_DIMENSIONS", "0")]).unwrap_err();
        assert!(err.to_string().contains("EMBEDDING_DIMENSIONS"));
    }

    #[test]
    fn test_openai_embeddings_require_key() {
        let err = config_from(&[("GROQ_API_KEY", "k"), ("EMBEDDING_PROVIDER", "openai")])
            .unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        let config = config_from(&[
            ("GROQ_API_KEY", "k"),
            ("EMBEDDING_PROVIDER", "openai"),
            ("OPENAI_API_KEY", "sk"),
            ("EMBEDDING_DIMENSIONS", "1536"),
        ])
        .unwrap();
        assert_eq!(config.embedding.api_key.as_deref(), Some("sk"));
        assert_eq!(config.embedding.dimensions, 1536);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("LLM_PROVIDER", "anthropic"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("EMAIL_COMPOSER", "template"),
            ("PORTFOLIO_TOP_K", "3"),
            ("COMPOSE_CONCURRENCY", "0"),
            ("SENDER_NAME", "Asha"),
        ])
        .unwrap();
        assert_eq!(config.llm_provider, LlmProvider::Anthropic);
        assert_eq!(config.composer, ComposerKind::Template);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.pipeline_settings().compose_concurrency, 1);
        assert_eq!(config.sender.name, "Asha");
    }
}
