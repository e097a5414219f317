use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::info;

use super::embedding::Embedder;
use super::store::{check_add_lengths, Metadata, QueryResponse, VectorStore};
use super::IndexError;
use crate::db::create_pool;

/// ivfflat list count. Queries probe every list, so results are exact at portfolio scale.
const IVFFLAT_LISTS: usize = 100;

/// PostgreSQL + pgvector store. Survives process restarts.
///
/// Several collections may share the `portfolio_vectors` table; every query is scoped to one.
/// Acquire with `open`, release with `close`.
pub struct PgVectorStore {
    pool: PgPool,
    collection: String,
    embedder: Arc<dyn Embedder>,
}

impl PgVectorStore {
    /// Connects and creates the extension, table and index if missing.
    /// Any failure here means the index is unavailable.
    pub async fn open(
        database_url: &str,
        collection: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, IndexError> {
        let pool = create_pool(database_url)
            .await
            .map_err(|e| IndexError::Unavailable(format!("cannot connect to index storage: {e}")))?;

        let store = Self {
            pool,
            collection: collection.to_string(),
            embedder,
        };

        if let Err(e) = store.initialize().await {
            store.pool.close().await;
            return Err(IndexError::Unavailable(format!(
                "cannot initialize index storage: {e}"
            )));
        }

        Ok(store)
    }

    async fn initialize(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await?;

        let create_sql = format!(
            "CREATE TABLE IF NOT EXISTS portfolio_vectors (
                id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                document TEXT NOT NULL,
                metadata JSONB NOT NULL,
                embedding vector({}) NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT CURRENT_TIMESTAMP
            )",
            self.embedder.dimensions()
        );
        sqlx::query(&create_sql).execute(&self.pool).await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_portfolio_vectors_collection
             ON portfolio_vectors(collection)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(&embedding_index_sql())
            .execute(&self.pool)
            .await?;

        info!(
            "Portfolio vector table ready (collection={}, dimensions={})",
            self.collection,
            self.embedder.dimensions()
        );
        Ok(())
    }
}

fn embedding_index_sql() -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS idx_portfolio_vectors_embedding
         ON portfolio_vectors USING ivfflat (embedding vector_cosine_ops) WITH (lists = {IVFFLAT_LISTS})"
    )
}

/// Must run inside the query's transaction; `SET LOCAL` ends with it.
fn probes_sql() -> String {
    format!("SET LOCAL ivfflat.probes = {IVFFLAT_LISTS}")
}

/// `LIMIT` bind value; saturates instead of wrapping negative.
fn limit_value(n_results: usize) -> i64 {
    i64::try_from(n_results).unwrap_or(i64::MAX)
}

/// pgvector text literal: `[0.1,0.2,...]`.
fn vector_literal(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn count(&self) -> Result<usize, IndexError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM portfolio_vectors WHERE collection = $1")
                .bind(&self.collection)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.max(0) as usize)
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

        let mut tx = self.pool.begin().await?;
        for (((document, metadata), id), embedding) in
            documents.iter().zip(metadatas).zip(ids).zip(&embeddings)
        {
            let metadata_json = serde_json::to_value(metadata)
                .map_err(|e| IndexError::InvalidInput(e.to_string()))?;

            sqlx::query(
                "INSERT INTO portfolio_vectors (id, collection, document, metadata, embedding)
                 VALUES ($1, $2, $3, $4, $5::vector)",
            )
            .bind(id)
            .bind(&self.collection)
            .bind(document)
            .bind(&metadata_json)
            .bind(vector_literal(embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

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

        let mut metadatas = Vec::with_capacity(query_embeddings.len());
        let mut distances = Vec::with_capacity(query_embeddings.len());

        let mut tx = self.pool.begin().await?;
        sqlx::query(&probes_sql()).execute(&mut *tx).await?;

        for embedding in &query_embeddings {
            let rows = sqlx::query(
                "SELECT metadata, embedding <=> $1::vector AS distance
                 FROM portfolio_vectors
                 WHERE collection = $2
                 ORDER BY distance
                 LIMIT $3",
            )
            .bind(vector_literal(embedding))
            .bind(&self.collection)
            .bind(limit_value(n_results))
            .fetch_all(&mut *tx)
            .await?;

            let mut row_metadatas = Vec::with_capacity(rows.len());
            let mut row_distances = Vec::with_capacity(rows.len());
            for row in rows {
                let metadata: serde_json::Value = row.get("metadata");
                let distance: f64 = row.get("distance");

                row_metadatas.push(metadata_from_json(metadata));
                row_distances.push(distance as f32);
            }
            metadatas.push(row_metadatas);
            distances.push(row_distances);
        }
        tx.commit().await?;

        Ok(QueryResponse {
            metadatas: Some(metadatas),
            distances: Some(distances),
        })
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Portfolio vector store connection pool closed");
    }

    fn backend_name(&self) -> &'static str {
        "pgvector"
    }
}

/// Keeps only string-valued metadata fields; anything else is dropped.
fn metadata_from_json(value: serde_json::Value) -> Metadata {
    match value {
        serde_json::Value::Object(map) => map
            .into_iter()
            .filter_map(|(k, v)| match v {
                serde_json::Value::String(s) => Some((k, s)),
                _ => None,
            })
            .collect(),
        _ => HashMap::new(),
    }
}
