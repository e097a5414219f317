//! Vector-search capability and the in-memory backend.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::embedding::Embedder;
use super::similarity::cosine_similarity;
use super::IndexError;

/// Per-vector metadata (`{"link": "..."}` for portfolio entries).
pub type Metadata = HashMap<String, String>;

/// Result of a similarity query: one inner list per query text, best match first.
///
/// Both fields are optional; a backend may omit them or return an empty outer list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub metadatas: Option<Vec<Vec<Metadata>>>,
    #[serde(default)]
    pub distances: Option<Vec<Vec<f32>>>,
}

/// Abstract vector store interface. Backends embed documents and query texts themselves.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Number of vectors currently stored.
    async fn count(&self) -> Result<usize, IndexError>;

    /// Stores one vector per document. The three slices must have equal length.
    async fn add(
        &self,
        documents: &[String],
        metadatas: &[Metadata],
        ids: &[String],
    ) -> Result<(), IndexError>;

    /// Returns up to `n_results` nearest neighbours for each query text.
    async fn query(
        &self,
        query_texts: &[String],
        n_results: usize,
    ) -> Result<QueryResponse, IndexError>;

    /// Releases the underlying storage handle.
    async fn close(&self) {}

    fn backend_name(&self) -> &'static str;
}

/// Checks the `add` contract shared by every backend.
pub(crate) fn check_add_lengths(
    documents: &[String],
    metadatas: &[Metadata],
    ids: &[String],
) -> Result<(), IndexError> {
    if documents.len() != metadatas.len() || documents.len() != ids.len() {
        return Err(IndexError::InvalidInput(format!(
            "documents ({}), metadatas ({}) and ids ({}) must have equal length",
            documents.len(),
            metadatas.len(),
            ids.len()
        )));
    }
    Ok(())
}

/// Association of one embedding with its metadata. Never mutated after insert.
#[derive(Debug, Clone)]
struct IndexedVector {
    id: String,
    embedding: Vec<f32>,
    metadata: Metadata,
}

/// Brute-force cosine-similarity store held in process memory.
///
/// Exact search; fine for portfolios of a few thousand rows. Contents are lost on restart.
pub struct InMemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    vectors: RwLock<Vec<IndexedVector>>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            vectors: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn count(&self) -> Result<usize, IndexError> {
        Ok(self.vectors.read().await.len())
    }

    async fn add(
        &self,
        documents: &[String],
        metadatas: &[Metadata],
        ids: &[String],
    ) -> Result<(), IndexError> {
        check_add_lengths(documents, metadatas, ids)?;
        if documents.is_empty() {
            return Ok(());
        }

        let embeddings = self.embedder.embed(documents).await?;

        let mut vectors = self.vectors.write().await;
        if let Some(id) = ids.iter().find(|id| vectors.iter().any(|v| &v.id == *id)) {
            return Err(IndexError::InvalidInput(format!("duplicate id '{id}'")));
        }
        for ((embedding, metadata), id) in embeddings.into_iter().zip(metadatas).zip(ids) {
            vectors.push(IndexedVector {
                id: id.clone(),
                embedding,
                metadata: metadata.clone(),
            });
        }
        Ok(())
    }

    async fn query(
        &self,
        query_texts: &[String],
        n_results: usize,
    ) -> Result<QueryResponse, IndexError> {
        if query_texts.is_empty() {
            return Ok(QueryResponse::default());
        }

        let query_embeddings = self.embedder.embed(query_texts).await?;
        let vectors = self.vectors.read().await;

        let mut metadatas = Vec::with_capacity(query_embeddings.len());
        let mut distances = Vec::with_capacity(query_embeddings.len());

        for query in &query_embeddings {
            let mut scored: Vec<(f32, &IndexedVector)> = vectors
                .iter()
                .map(|v| (cosine_similarity(query, &v.embedding), v))
                .collect();
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
            scored.truncate(n_results);

            distances.push(scored.iter().map(|(sim, _)| 1.0 - sim).collect());
            metadatas.push(scored.into_iter().map(|(_, v)| v.metadata.clone()).collect());
        }

        Ok(QueryResponse {
            metadatas: Some(metadatas),
            distances: Some(distances),
        })
    }

    fn backend_name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::embedding::HashEmbedder;

    fn store() -> InMemoryVectorStore {
        InMemoryVectorStore::new(Arc::new(HashEmbedder::default()))
    }

    fn meta(link: &str) -> Metadata {
        HashMap::from([("link".to_string(), link.to_string())])
    }

    #[tokio::test]
    async fn add_and_count() {
        let store = store();
        store
            .add(
                &["Rust, Tokio".to_string(), "Go, gRPC".to_string()],
                &[meta("a"), meta("b")],
                &["1".to_string(), "2".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn add_rejects_mismatched_lengths() {
        let store = store();
        let err = store
            .add(&["Rust".to_string()], &[], &["1".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidInput(_)));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn add_rejects_duplicate_ids() {
        let store = store();
        store
            .add(&["Rust".to_string()], &[meta("a")], &["1".to_string()])
            .await
            .unwrap();
        let err = store
            .add(&["Go".to_string()], &[meta("b")], &["1".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn query_orders_by_similarity() {
        let store = store();
        store
            .add(
                &[
                    "Swift, iOS, Xcode".to_string(),
                    "Python, AWS, Docker".to_string(),
                    "Python, Django".to_string(),
                ],
                &[meta("ios"), meta("py-aws"), meta("py-web")],
                &["1".to_string(), "2".to_string(), "3".to_string()],
            )
            .await
            .unwrap();

        let res = store.query(&["Python, AWS".to_string()], 2).await.unwrap();
        let metas = res.metadatas.unwrap();
        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0].len(), 2);
        assert_eq!(metas[0][0]["link"], "py-aws");

        let distances = res.distances.unwrap();
        assert!(distances[0][0] <= distances[0][1]);
    }

    #[tokio::test]
    async fn query_on_empty_store_returns_empty_inner_list() {
        let res = store().query(&["Rust".to_string()], 2).await.unwrap();
        assert_eq!(res.metadatas.unwrap(), vec![Vec::<Metadata>::new()]);
    }

    #[test]
    fn query_response_tolerates_missing_keys() {
        let res: QueryResponse = serde_json::from_str("{}").unwrap();
        assert!(res.metadatas.is_none());
        assert!(res.distances.is_none());
    }
}
