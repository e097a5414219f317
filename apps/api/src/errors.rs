use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::llm_client::LlmError;
use crate::portfolio::IndexError;

/// Failures of one pipeline run, by stage.
///
/// `IndexUnavailable` is fatal for the run. `ExtractionParse` keeps the model output for diagnosis.
/// Per-posting composition failures are not here: they are reported inside the run's results.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Portfolio index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Portfolio index error: {0}")]
    Index(String),

    #[error("Failed to parse job postings from model output: {message}")]
    ExtractionParse { message: String, raw_output: String },

    #[error("Job extraction call failed: {0}")]
    Extraction(#[source] LlmError),
}

impl From<IndexError> for PipelineError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Unavailable(msg) => PipelineError::IndexUnavailable(msg),
            other => PipelineError::Index(other.to_string()),
        }
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                Value::Null,
            ),
            AppError::Pipeline(PipelineError::ExtractionParse {
                message,
                raw_output,
            }) => {
                tracing::warn!("Extraction parse error: {message}; raw output: {raw_output:?}");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "EXTRACTION_PARSE_ERROR",
                    format!("Could not read job postings from the model output: {message}"),
                    json!({ "raw_output": raw_output }),
                )
            }
            AppError::Pipeline(PipelineError::Extraction(e)) => {
                tracing::error!("LLM error during extraction: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "LLM_ERROR",
                    "The language model call failed during job extraction".to_string(),
                    Value::Null,
                )
            }
            AppError::Pipeline(PipelineError::IndexUnavailable(msg)) => {
                tracing::error!("Portfolio index unavailable: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "INDEX_UNAVAILABLE",
                    "The portfolio index is unavailable".to_string(),
                    Value::Null,
                )
            }
            AppError::Pipeline(PipelineError::Index(msg)) => {
                tracing::error!("Portfolio index error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INDEX_ERROR",
                    "A portfolio index error occurred".to_string(),
                    Value::Null,
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    Value::Null,
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if !details.is_null() {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
