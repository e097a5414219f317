use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service version plus the active model provider and index backend.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "outreach-api",
        "llm_provider": state.config.llm_provider.to_string(),
        "index_backend": state.pipeline.index().backend_name(),
    }))
}
