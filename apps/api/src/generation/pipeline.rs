//! Outreach Pipeline — orchestrates one run over a scraped careers page.
//!
//! Flow: normalize → ensure portfolio index loaded → extract_jobs →
//!       per posting: index.query(skills) → composer.compose(job, links) → report.
//!
//! Postings are composed concurrently (bounded) but results keep extraction order.
//! A composition failure is recorded on its posting; the other postings still complete.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::PipelineError;
use crate::generation::composer::{EmailComposer, EmailDraft};
use crate::generation::extractor::{extract_jobs, JobPosting};
use crate::llm_client::TextGenerator;
use crate::normalize::{document_preview, normalize, PREVIEW_CHARS};
use crate::portfolio::{LoadOutcome, PortfolioEntry, PortfolioIndex, DEFAULT_TOP_K};

/// Default number of postings composed at the same time.
pub const DEFAULT_COMPOSE_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub top_k: usize,
    pub compose_concurrency: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            compose_concurrency: DEFAULT_COMPOSE_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every posting got an email.
    Ok,
    /// At least one posting failed composition.
    Partial,
    /// Extraction found zero postings. Informational, not an error.
    NoPostings,
}

/// Outcome for one posting, in extraction order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftResult {
    pub job: JobPosting,
    pub links: Vec<String>,
    pub email: Option<EmailDraft>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub status: RunStatus,
    pub document_preview: String,
    pub results: Vec<DraftResult>,
    pub generated_at: DateTime<Utc>,
}

impl PipelineReport {
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.error.is_some()).count()
    }
}

/// Postings extracted from one document, with the normalized text they came from.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub document: String,
    pub jobs: Vec<JobPosting>,
}

pub struct Pipeline {
    index: Arc<PortfolioIndex>,
    portfolio: Arc<Vec<PortfolioEntry>>,
    llm: Arc<dyn TextGenerator>,
    composer: Arc<dyn EmailComposer>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        index: Arc<PortfolioIndex>,
        portfolio: Vec<PortfolioEntry>,
        llm: Arc<dyn TextGenerator>,
        composer: Arc<dyn EmailComposer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            index,
            portfolio: Arc::new(portfolio),
            llm,
            composer,
            settings,
        }
    }

    pub fn index(&self) -> &PortfolioIndex {
        &self.index
    }

    pub fn settings(&self) -> PipelineSettings {
        self.settings
    }

    /// Loads the portfolio into the index. No-op once the index holds vectors.
    pub async fn ensure_loaded(&self) -> Result<LoadOutcome, PipelineError> {
        Ok(self.index.load(&self.portfolio).await?)
    }

    /// Normalizes a raw document and extracts its job postings.
    pub async fn extract(&self, raw_document: &str) -> Result<Extraction, PipelineError> {
        let document = normalize(raw_document);
        info!(
            "Normalized document: {} -> {} chars",
            raw_document.len(),
            document.len()
        );

        let jobs = extract_jobs(&document, self.llm.as_ref()).await?;
        info!("Extracted {} job postings", jobs.len());

        Ok(Extraction { document, jobs })
    }

    /// Portfolio links for a set of skills.
    pub async fn match_links(
        &self,
        skills: &[String],
        top_k: usize,
    ) -> Result<Vec<String>, PipelineError> {
        Ok(self.index.query(skills, top_k).await?)
    }

    /// Runs the full pipeline over one raw document.
    ///
    /// Fails only for run-level problems (index, extraction). Per-posting composition
    /// failures are reported in the results and make the status `Partial`.
    pub async fn run(&self, raw_document: &str) -> Result<PipelineReport, PipelineError> {
        let document = normalize(raw_document);
        let preview = document_preview(&document, PREVIEW_CHARS);
        info!(
            "Normalized document: {} -> {} chars",
            raw_document.len(),
            document.len()
        );

        self.ensure_loaded().await?;

        let jobs = extract_jobs(&document, self.llm.as_ref()).await?;
        info!("Extracted {} job postings", jobs.len());

        if jobs.is_empty() {
            info!("No job postings found in document");
            return Ok(PipelineReport {
                status: RunStatus::NoPostings,
                document_preview: preview,
                results: Vec::new(),
                generated_at: Utc::now(),
            });
        }

        let tasks: Vec<_> = jobs.into_iter().map(|job| self.draft_for(job)).collect();
        let results: Vec<DraftResult> = stream::iter(tasks)
            .buffered(self.settings.compose_concurrency.max(1))
            .try_collect()
            .await?;

        let mut report = PipelineReport {
            status: RunStatus::Ok,
            document_preview: preview,
            results,
            generated_at: Utc::now(),
        };
        let failed = report.failed_count();
        if failed > 0 {
            report.status = RunStatus::Partial;
        }
        info!(
            "Composed {} of {} emails",
            report.results.len() - failed,
            report.results.len()
        );

        Ok(report)
    }

    async fn draft_for(&self, job: JobPosting) -> Result<DraftResult, PipelineError> {
        let links = self.index.query(&job.skills, self.settings.top_k).await?;

        let result = match self.composer.compose(&job, &links).await {
            Ok(email) => DraftResult {
                job,
                links,
                email: Some(email),
                error: None,
            },
            Err(failure) => {
                warn!("{failure}");
                DraftResult {
                    job,
                    links,
                    email: None,
                    error: Some(failure.to_string()),
                }
            }
        };
        Ok(result)
    }
}
