use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use asr_relay::engine::{DashScopeEngine, VocabularyClient};
use asr_relay::{create_router, AppState, Config, EngineConfig, SessionConfig};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "asr-relay",
    about = "Relays live client audio into a streaming recognition engine and returns ordered transcripts"
)]
struct Args {
    /// Config file, without extension
    #[arg(long, default_value = "config/asr-relay")]
    config: String,

    /// Override the bind address from the config file
    #[arg(long)]
    bind: Option<String>,

    /// Override the port from the config file
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let api_key = cfg
        .engine
        .api_key
        .clone()
        .or_else(|| std::env::var("DASHSCOPE_API_KEY").ok())
        .context("No engine API key: set [engine] api_key or the DASHSCOPE_API_KEY env var")?;

    // The vocabulary is resolved once here and shared read-only by every
    // session; a failed lookup degrades to recognition without biasing.
    let vocabulary_id = resolve_vocabulary(&cfg, &api_key).await;

    let engine_config = EngineConfig {
        model: cfg.engine.model.clone(),
        vocabulary_id,
        format: "pcm".to_string(),
        sample_rate: cfg.engine.sample_rate,
        language_hints: cfg.engine.language_hints.clone(),
        semantic_punctuation: cfg.engine.semantic_punctuation,
    };
    let engine = Arc::new(DashScopeEngine::new(cfg.engine.endpoint.clone(), api_key));

    let session_template = SessionConfig {
        sample_rate: cfg.engine.sample_rate,
        engine_flush_timeout: Duration::from_secs(cfg.session.engine_flush_timeout_secs),
        drain_timeout: Duration::from_secs(cfg.session.drain_timeout_secs),
        max_pending_events: cfg.session.max_pending_events,
        capture_dir: cfg.audio.capture_dir.as_ref().map(PathBuf::from),
        ..SessionConfig::default()
    };

    let state = AppState::new(engine, engine_config, session_template);
    let app = create_router(state.clone());

    let bind = args.bind.unwrap_or(cfg.service.ws.bind);
    let port = args.port.unwrap_or(cfg.service.ws.port);
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind, port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", bind, port))?;

    info!("WebSocket server started on ws://{}:{}/asr", bind, port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn resolve_vocabulary(cfg: &Config, api_key: &str) -> Option<String> {
    let client = match VocabularyClient::new(
        cfg.engine.vocabulary_endpoint.clone(),
        api_key.to_string(),
    ) {
        Ok(client) => client,
        Err(e) => {
            warn!("Vocabulary client unavailable, continuing without one: {:#}", e);
            return None;
        }
    };

    match client.latest_vocabulary().await {
        Ok(Some(id)) => {
            info!("Using vocabulary {}", id);
            Some(id)
        }
        Ok(None) => {
            info!("No custom vocabularies available");
            None
        }
        Err(e) => {
            warn!("Vocabulary lookup failed, continuing without one: {:#}", e);
            None
        }
    }
}

/// Resolves on ctrl-c, after asking every active session to stop and drain
async fn shutdown_signal(state: AppState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }

    info!("Shutdown requested, draining active sessions");
    state.stop_all(Duration::from_secs(15)).await;
}
