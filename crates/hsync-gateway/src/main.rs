use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use hsync_core::HsyncConfig;
use hsync_hub::Hub;
use tracing::{info, warn};

mod app;
mod experiments;
mod http;
mod rate_limit;
mod render;
mod sse;

const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Hypermedia sync server: htmx pages kept in step over Server-Sent Events.
#[derive(Debug, Parser)]
#[command(name = "hsync-gateway", version)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, env = "HSYNC_CONFIG")]
    config: Option<String>,

    /// Override `server.bind`.
    #[arg(long)]
    bind: Option<String>,

    /// Override `server.port`.
    #[arg(short, long)]
    port: Option<u16>,
}

/// Resolve the config file (explicit path > HSYNC_CONFIG env > ./hsync.toml)
/// and apply CLI overrides. A missing file means defaults; a file that fails
/// to parse or validate stops startup.
fn load_config(cli: &Cli) -> anyhow::Result<HsyncConfig> {
    let path = cli
        .config
        .as_deref()
        .unwrap_or(hsync_core::config::DEFAULT_CONFIG_FILE);
    if !std::path::Path::new(path).exists() {
        warn!(%path, "config file not found, using defaults");
    }

    let mut config =
        HsyncConfig::load(Some(path)).with_context(|| format!("invalid config in {path}"))?;
    if let Some(bind) = cli.bind.clone() {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hsync_gateway=info,hsync_hub=info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = load_config(&cli)?;

    let (hub, hub_task) = Hub::spawn(&config.hub, render::presence_fragment);
    info!(
        queue_capacity = config.hub.queue_capacity,
        policy = ?config.hub.full_policy,
        "hub started"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let state = Arc::new(app::AppState::new(config, hub));
    let router = app::build_router(Arc::clone(&state));
    info!(
        checkboxes = state.checkboxes.len(),
        canvas = %format!("{}x{}", state.canvas.width(), state.canvas.height()),
        "experiments ready"
    );

    // drop rate-limit buckets for clients that went quiet
    let pruner = Arc::clone(&state);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            tokio::select! {
                _ = pruner.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = pruner.limiter.prune(rate_limit::IDLE_BUCKET_TTL);
                    if removed > 0 {
                        tracing::debug!(removed, tracked = pruner.limiter.tracked(), "pruned idle rate-limit buckets");
                    }
                }
            }
        }
    });

    info!("Hypermedia sync gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown = state.shutdown.clone();
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for shutdown signal: {e}");
        }
        info!("shutdown requested, closing event streams");
        shutdown.cancel();
    })
    .await?;

    // The router and every stream held a hub handle; once they are gone the
    // coordinator loop ends on its own.
    drop(state);
    if tokio::time::timeout(Duration::from_secs(5), hub_task).await.is_err() {
        warn!("hub did not stop within 5s");
    }
    info!("gateway stopped");
    Ok(())
}
