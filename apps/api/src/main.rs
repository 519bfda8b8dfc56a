mod config;
mod errors;
mod intake;
mod llm_client;
mod models;
mod parser;
mod pipeline;
mod routes;
mod scoring;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::embeddings::EmbeddingClient;
use crate::llm_client::LlmClient;
use crate::parser::{ResumeParser, SkillCatalog};
use crate::pipeline::queue::{JobQueue, MemoryQueue, RedisQueue};
use crate::pipeline::MatchPipeline;
use crate::routes::{build_router, with_frontend};
use crate::scoring::ScoringAggregator;
use crate::state::AppState;
use crate::store::{MatchStore, MemoryStore, PgStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting FitScore API v{}", env!("CARGO_PKG_VERSION"));

    // Match record store
    let store: Arc<dyn MatchStore> = match &config.database_url {
        Some(url) => {
            Arc::new(PgStore::connect(url).await?)
        }
        None => {
            warn!("DATABASE_URL not set, records are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    // Job queue
    let queue: Arc<dyn JobQueue> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str()).context("Invalid REDIS_URL")?;
            info!(key = %config.redis_queue_key, "Redis queue initialized");
            Arc::new(RedisQueue::new(client, config.redis_queue_key.clone()))
        }
        None => {
            info!("REDIS_URL not set, using in-process queue");
            Arc::new(MemoryQueue::new())
        }
    };

    // Scoring providers
    let llm = LlmClient::new(
        config.anthropic_api_key.clone(),
        config.http_timeout,
        config.llm_max_attempts,
    )?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let embedder = EmbeddingClient::new(
        config.openai_api_key.clone(),
        config.openai_base_url.clone(),
        config.embedding_model.clone(),
        config.http_timeout,
    )?;
    info!("Embedding client initialized (model: {})", embedder.model());

    let aggregator = ScoringAggregator::new(Arc::new(embedder), Arc::new(llm));

    // Skill catalog for the resume parser
    let skills = match &config.skills_file {
        Some(path) => SkillCatalog::from_file(path)?,
        None => SkillCatalog::builtin().context("Built-in skill list is invalid")?,
    };
    if skills.is_empty() {
        warn!("Skill catalog is empty, parsed resumes will list no skills");
    }
    let parser = ResumeParser::new(skills).context("Failed to build resume parser")?;
    info!("Skill catalog loaded ({} skills)", parser.catalog().len());

    let pipeline = MatchPipeline::start(store.clone(), queue, aggregator);

    let state = AppState {
        store,
        submitter: pipeline.submitter(),
        parser: Arc::new(parser),
        upload_dir: config.upload_dir.clone(),
    };

    let mut app = build_router(state);
    if let Some(dir) = &config.frontend_dir {
        info!("Serving frontend from {}", dir.display());
        app = with_frontend(app, dir);
    }
    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS once the frontend origin is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // In-flight match finishes before the process exits.
    pipeline.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
