//! Portfolio Index — semantic lookup from a job's skills to links of past projects.
//!
//! `PortfolioIndex` owns the load-once policy and link extraction; storage and embedding
//! are pluggable (`VectorStore`, `Embedder`).

pub mod embedding;
pub mod pgvector;
pub mod similarity;
pub mod source;
pub mod store;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::portfolio::store::{Metadata, QueryResponse, VectorStore};

/// Metadata key carrying the portfolio link of a stored vector.
pub const LINK_KEY: &str = "link";

/// Number of links returned per posting unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 2;

/// Largest `top_k` accepted from API callers.
pub const MAX_TOP_K: usize = 50;

#[derive(Debug, Error)]
pub enum IndexError {
    /// Storage cannot be opened or reached. Fatal for a pipeline run.
    #[error("{0}")]
    Unavailable(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("storage error: {0}")]
    Storage(#[source] sqlx::Error),

    #[error("invalid index input: {0}")]
    InvalidInput(String),
}

impl From<sqlx::Error> for IndexError {
    /// Lost connections mean the index is unavailable; everything else is a storage error.
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => {
                IndexError::Unavailable(format!("index storage unreachable: {err}"))
            }
            other => IndexError::Storage(other),
        }
    }
}

/// One past project: its technology stack and where to see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioEntry {
    pub id: Uuid,
    pub tech_stack: String,
    pub link: String,
}

impl PortfolioEntry {
    /// Creates an entry with a fresh unique id.
    pub fn new(tech_stack: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tech_stack: tech_stack.into(),
            link: link.into(),
        }
    }
}

/// What a `load` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The index already held vectors; nothing was inserted.
    AlreadyLoaded { existing: usize },
    Inserted { count: usize },
}

/// Semantic index over portfolio entries.
pub struct PortfolioIndex {
    store: Arc<dyn VectorStore>,
    // Serializes the count-then-insert sequence in `load`.
    load_lock: Mutex<()>,
}

impl PortfolioIndex {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            load_lock: Mutex::new(()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Inserts one vector per entry, unless the index already holds any vectors.
    ///
    /// Idempotent: a second call (same or different entries) is a no-op once the index is
    /// populated, so repeated startups against persistent storage never duplicate vectors.
    pub async fn load(&self, entries: &[PortfolioEntry]) -> Result<LoadOutcome, IndexError> {
        let _guard = self.load_lock.lock().await;

        let existing = self.store.count().await?;
        if existing > 0 {
            debug!("Portfolio index already holds {existing} vectors; skipping load");
            return Ok(LoadOutcome::AlreadyLoaded { existing });
        }

        let documents: Vec<String> = entries.iter().map(|e| e.tech_stack.clone()).collect();
        let metadatas: Vec<Metadata> = entries
            .iter()
            .map(|e| HashMap::from([(LINK_KEY.to_string(), e.link.clone())]))
            .collect();
        let ids: Vec<String> = entries.iter().map(|e| e.id.to_string()).collect();

        self.store.add(&documents, &metadatas, &ids).await?;

        info!(
            "Loaded {} portfolio entries into the {} index",
            entries.len(),
            self.store.backend_name()
        );
        Ok(LoadOutcome::Inserted {
            count: entries.len(),
        })
    }

    /// Returns up to `top_k` portfolio links for a posting's skills, most similar first.
    ///
    /// The skills are joined into one composite query string. An empty skill list, an empty
    /// index or `top_k == 0` yields no links; none of these are errors.
    pub async fn query(&self, skills: &[String], top_k: usize) -> Result<Vec<String>, IndexError> {
        let query = composite_query(skills);
        if query.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let response = self.store.query(&[query], top_k).await?;
        let links = links_from_response(response, top_k);
        debug!("Portfolio query matched {} links", links.len());
        Ok(links)
    }

    /// Releases the storage handle.
    pub async fn close(&self) {
        self.store.close().await;
    }
}

/// Joins non-blank skills into one query string.
fn composite_query(skills: &[String]) -> String {
    skills
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reads links from the first query's results. Tolerates a missing `metadatas` field, an empty
/// outer list and metadata without a link.
fn links_from_response(response: QueryResponse, top_k: usize) -> Vec<String> {
    response
        .metadatas
        .and_then(|outer| outer.into_iter().next())
        .unwrap_or_default()
        .into_iter()
        .filter_map(|mut meta| meta.remove(LINK_KEY))
        .take(top_k)
        .collect()
}
