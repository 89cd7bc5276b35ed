mod cache;
mod config;
mod errors;
mod generation;
mod llm_client;
mod pipeline;
mod research;
mod routes;
mod search;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{
    fmt::writer::MakeWriterExt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::cache::{CacheStore, MemoryCacheStore, RedisCacheStore};
use crate::config::Config;
use crate::llm_client::AnthropicClient;
use crate::pipeline::call_log::ExecutionLogger;
use crate::pipeline::PipelineContext;
use crate::routes::build_router;
use crate::search::TavilyClient;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed numeric env vars)
    let config = Config::from_env()?;

    // Initialize structured logging: WARN and ERROR to stderr, the rest to stdout
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr.with_max_level(Level::WARN).or_else(std::io::stdout)),
        )
        .init();

    info!("Starting hireflow v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    if config.anthropic_api_key.is_none() {
        warn!("ANTHROPIC_API_KEY is not set; generation requests will fail");
    }
    let llm = AnthropicClient::new(config.anthropic_api_key.clone(), config.llm_timeout)?;
    info!(
        primary = %config.primary_model,
        fallback = %config.fallback_model,
        "LLM client initialized"
    );

    // Initialize search client
    if config.search_api_key.is_none() {
        warn!("SEARCH_API_KEY is not set; deep market research will fail");
    }
    let search = TavilyClient::new(config.search_api_key.clone(), config.llm_timeout)?;

    // Initialize result cache
    let cache: Arc<dyn CacheStore> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            info!("Redis cache initialized");
            Arc::new(RedisCacheStore::new(client))
        }
        None => {
            info!("REDIS_URL not set; using in-memory cache");
            Arc::new(MemoryCacheStore::new())
        }
    };

    // Build pipeline context
    let ctx = PipelineContext::new(Arc::new(llm), Arc::new(search), Arc::new(ExecutionLogger::new()))
        .with_models(config.models())
        .with_retry(config.retry)
        .with_research(config.research());

    let state = AppState {
        ctx: Arc::new(ctx),
        cache,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
