//! Axum route handlers for the Outreach API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::generation::extractor::JobPosting;
use crate::generation::pipeline::PipelineReport;
use crate::normalize::{document_preview, PREVIEW_CHARS};
use crate::portfolio::MAX_TOP_K;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PageRequest {
    /// Raw page text or HTML, as fetched by the caller.
    pub page_text: String,
}

#[derive(Debug, Serialize)]
pub struct ExtractJobsResponse {
    pub jobs: Vec<JobPosting>,
    pub document_preview: String,
}

#[derive(Debug, Deserialize)]
pub struct PortfolioQueryRequest {
    pub skills: Vec<String>,
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PortfolioQueryResponse {
    pub links: Vec<String>,
}

fn require_page_text(request: &PageRequest) -> Result<(), AppError> {
    if request.page_text.trim().is_empty() {
        return Err(AppError::Validation("page_text cannot be empty".to_string()));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/jobs/extract
///
/// Normalizes the page and returns the extracted postings without writing emails.
/// Useful for previewing extraction before generating.
pub async fn handle_extract_jobs(
    State(state): State<AppState>,
    Json(request): Json<PageRequest>,
) -> Result<Json<ExtractJobsResponse>, AppError> {
    require_page_text(&request)?;

    let extraction = state.pipeline.extract(&request.page_text).await?;

    Ok(Json(ExtractJobsResponse {
        document_preview: document_preview(&extraction.document, PREVIEW_CHARS),
        jobs: extraction.jobs,
    }))
}

/// POST /api/v1/portfolio/query
///
/// Returns the portfolio links closest to a skill list.
pub async fn handle_portfolio_query(
    State(state): State<AppState>,
    Json(request): Json<PortfolioQueryRequest>,
) -> Result<Json<PortfolioQueryResponse>, AppError> {
    let top_k = request
        .top_k
        .unwrap_or(state.pipeline.settings().top_k);
    if top_k > MAX_TOP_K {
        return Err(AppError::Validation(format!(
            "top_k must be at most {MAX_TOP_K}"
        )));
    }

    let links = state.pipeline.match_links(&request.skills, top_k).await?;

    Ok(Json(PortfolioQueryResponse { links }))
}

/// POST /api/v1/emails/generate
///
/// Full pipeline: normalize → extract → match portfolio → compose one email per posting.
/// Zero postings is a successful `no_postings` report, not an error.
pub async fn handle_generate_emails(
    State(state): State<AppState>,
    Json(request): Json<PageRequest>,
) -> Result<Json<PipelineReport>, AppError> {
    require_page_text(&request)?;

    let report = state.pipeline.run(&request.page_text).await?;

    Ok(Json(report))
}
