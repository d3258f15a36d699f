mod config;
mod context;
mod errors;
mod export;
mod generation;
mod llm_client;
mod roster;
mod routes;
mod state;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::generation::profiles::ToolCatalog;
use crate::generation::workspace::{spawn_sweeper, WorkspaceRegistry};
use crate::llm_client::GeminiClient;
use crate::roster::DutyRoster;
use crate::routes::build_router;
use crate::state::AppState;

/// Request bodies above this are refused before reaching a handler. Leaves
/// headroom over the largest attachment ceiling for multipart framing.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

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

    info!("Starting casework API v{}", env!("CARGO_PKG_VERSION"));

    let generator = GeminiClient::new(
        config.gemini_api_key.clone(),
        &config.generation_api_url,
        Duration::from_secs(config.generation_timeout_secs),
    )?;
    info!(
        "Generation client initialized (fast: {}, reasoning: {})",
        llm_client::FAST_MODEL,
        llm_client::REASONING_MODEL
    );

    let roster = match &config.roster_path {
        Some(path) => DutyRoster::load(path).await?,
        None => DutyRoster::empty(),
    };
    info!("Duty roster loaded ({} positions)", roster.len());

    let catalog = ToolCatalog::builtin();
    info!("Tool catalog: {} profiles", catalog.iter().count());

    let workspaces = WorkspaceRegistry::default();
    spawn_sweeper(
        workspaces.clone(),
        SWEEP_INTERVAL,
        Duration::from_secs(config.workspace_idle_minutes * 60),
    );
    info!(
        "Idle workspaces evicted after {} minutes",
        config.workspace_idle_minutes
    );

    let state = AppState {
        generator: Arc::new(generator),
        workspaces,
        catalog: Arc::new(catalog),
        roster: Arc::new(roster),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
