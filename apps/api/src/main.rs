mod config;
mod db;
mod errors;
mod generation;
mod llm_client;
mod normalize;
mod portfolio;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, EmbeddingProvider};
use crate::generation::composer::build_composer;
use crate::generation::pipeline::Pipeline;
use crate::llm_client::{LlmClient, TextGenerator};
use crate::portfolio::embedding::{Embedder, HashEmbedder, OpenAiEmbedder};
use crate::portfolio::pgvector::PgVectorStore;
use crate::portfolio::source::read_portfolio_csv;
use crate::portfolio::store::{InMemoryVectorStore, VectorStore};
use crate::portfolio::{LoadOutcome, PortfolioIndex};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Outreach API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let client = LlmClient::new(
        config.llm_provider,
        config.llm_api_key.clone(),
        config.llm_model.clone(),
    );
    info!(
        "LLM client initialized (provider: {}, model: {})",
        client.provider(),
        client.model()
    );
    let llm: Arc<dyn TextGenerator> = Arc::new(client);

    // Initialize portfolio index (pgvector when DATABASE_URL is set, in-memory otherwise)
    let embedder = build_embedder(&config);
    info!(
        "Embedder initialized ({}, {} dims)",
        embedder.name(),
        embedder.dimensions()
    );
    let store: Arc<dyn VectorStore> = match &config.database_url {
        Some(url) => Arc::new(
            PgVectorStore::open(url, &config.portfolio_collection, embedder).await?,
        ),
        None => {
            warn!("DATABASE_URL not set; portfolio index is in memory and rebuilt on every start");
            Arc::new(InMemoryVectorStore::new(embedder))
        }
    };
    let index = Arc::new(PortfolioIndex::new(store));

    let portfolio = read_portfolio_csv(&config.portfolio_csv)?;

    let composer = build_composer(config.composer, llm.clone(), config.sender.clone());
    info!("Email composer: {}", composer.name());

    let pipeline = Arc::new(Pipeline::new(
        index.clone(),
        portfolio,
        llm,
        composer,
        config.pipeline_settings(),
    ));

    match pipeline.ensure_loaded().await? {
        LoadOutcome::AlreadyLoaded { existing } => {
            info!("Portfolio index already populated ({existing} vectors)")
        }
        LoadOutcome::Inserted { count } => info!("Portfolio index loaded ({count} vectors)"),
    }

    // Build app state
    let state = AppState {
        pipeline,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    index.close().await;
    info!("Shut down cleanly");

    Ok(())
}

fn build_embedder(config: &Config) -> Arc<dyn Embedder> {
    let settings = &config.embedding;
    match settings.provider {
        EmbeddingProvider::Hash => Arc::new(HashEmbedder::new(settings.dimensions)),
        EmbeddingProvider::OpenAi => Arc::new(OpenAiEmbedder::new(
            &settings.model,
            settings.api_key.as_deref().unwrap_or_default(),
            settings.dimensions,
            settings.base_url.as_deref(),
        )),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
