//! trackdeck playback service binary
//!
//! Composes the metadata cache, catalog resolver, playback engine and
//! playlist orchestrator, then serves the HTTP/SSE API until shutdown.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trackdeck_common::events::EventBus;
use trackdeck_player::api::{self, AppState};
use trackdeck_player::cache::MetadataCache;
use trackdeck_player::config::Config;
use trackdeck_player::playback::device::SimulatedOutput;
use trackdeck_player::playback::{PlaybackEngine, PlaylistOrchestrator};
use trackdeck_player::resolver::CatalogResolver;

#[derive(Parser, Debug)]
#[command(name = "trackdeck-player", about = "Playlist playback service")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "TRACKDECK_CONFIG")]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(short, long, env = "TRACKDECK_BIND")]
    bind: Option<String>,

    /// Override the catalog base URL
    #[arg(long, env = "TRACKDECK_CATALOG_URL")]
    catalog_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trackdeck=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(catalog_url) = args.catalog_url {
        config.catalog_url = catalog_url;
    }

    info!("Starting trackdeck-player");
    info!("Catalog at {}", config.catalog_url);

    let cache = MetadataCache::open(&config.cache_db)
        .await
        .context("opening metadata cache")?;
    let resolver = Arc::new(CatalogResolver::new(config.catalog_url.clone(), cache));

    let events = EventBus::new(config.event_capacity);
    let (output, signals) = SimulatedOutput::new(config.frame_ms);
    let engine = PlaybackEngine::new(output, signals, resolver, events.clone());
    let player = PlaylistOrchestrator::new(engine, events.clone());

    let router = api::create_router(AppState::new(player, events));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
