//! Embedding backends for the portfolio index.
//!
//! `HashEmbedder` is deterministic and offline (feature hashing). `OpenAiEmbedder` calls an
//! OpenAI-compatible `/embeddings` endpoint.

use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;

use super::IndexError;

/// Default dimension for both backends (matches small sentence-embedding models).
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Fixed keys: changing them changes every stored vector, so a persisted index must be rebuilt.
const HASH_SEED_K0: u64 = 0x6f75_7472_6561_6368;
const HASH_SEED_K1: u64 = 0x706f_7274_666f_6c69;

const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_BATCH_SIZE: usize = 100;

/// Abstract embedding model interface.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds each text; output order matches input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError>;

    fn dimensions(&self) -> usize;

    fn name(&self) -> &'static str;
}

// ────────────────────────────────────────────────────────────────────────────
// HashEmbedder
// ────────────────────────────────────────────────────────────────────────────

/// Feature-hashing embedder.
///
/// - no model download, no network
/// - SipHash-1-3 with fixed keys, stable across Rust versions and restarts
/// - signed hashing to reduce collision bias, then L2 normalization
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn hash(&self, token: &str) -> u64 {
        let mut hasher = SipHasher13::new_with_keys(HASH_SEED_K0, HASH_SEED_K1);
        token.hash(&mut hasher);
        hasher.finish()
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in tokenize(text) {
            let idx = (self.hash(&token) % self.dimensions as u64) as usize;
            let sign = if self.hash(&format!("{token}_sign")) % 2 == 0 {
                1.0
            } else {
                -1.0
            };
            vector[idx] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &'static str {
        "hash"
    }
}

/// Lowercased technology tokens. Keeps `+`, `#` and inner dots so `C++`, `C#` and `Node.js`
/// survive as single tokens.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#' || c == '.'))
        .map(|t| t.trim_matches('.'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

// ────────────────────────────────────────────────────────────────────────────
// OpenAiEmbedder
// ────────────────────────────────────────────────────────────────────────────

/// OpenAI-compatible embedding model via HTTP.
pub struct OpenAiEmbedder {
    model_name: String,
    api_key: String,
    base_url: String,
    dimensions: usize,
    http_client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(model_name: &str, api_key: &str, dimensions: usize, base_url: Option<&str>) -> Self {
        Self {
            model_name: model_name.to_string(),
            api_key: api_key.to_string(),
            base_url: base_url
                .unwrap_or(OPENAI_DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            dimensions,
            http_client: reqwest::Client::new(),
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        let request = EmbeddingRequest {
            model: &self.model_name,
            input: texts,
            dimensions: self.dimensions,
        };

        let resp = self
            .http_client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| IndexError::Embedding(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(IndexError::Embedding(format!(
                "embedding API error ({status}): {body}"
            )));
        }

        let response: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| IndexError::Embedding(e.to_string()))?;
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(OPENAI_BATCH_SIZE) {
            let embeddings = self.embed_batch(batch).await?;

            if embeddings.len() != batch.len() {
                return Err(IndexError::Embedding(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }
            for emb in &embeddings {
                if emb.len() != self.dimensions {
                    return Err(IndexError::Embedding(format!(
                        "Embedding dimension mismatch: expected {}, got {}",
                        self.dimensions,
                        emb.len()
                    )));
                }
            }

            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
