use std::sync::Arc;

use crate::config::Config;
use crate::generation::pipeline::Pipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pipeline with its portfolio index, model client and composer.
    pub pipeline: Arc<Pipeline>,
    pub config: Config,
}
