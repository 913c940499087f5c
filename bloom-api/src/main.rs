//! bloom-api - BrandBloom Insights backend service
//!
//! Serves the analysis wizard's REST API on top of a data root folder and
//! forwards concatenation to the Python backend.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bloom_api::{build_router, AppState};
use bloom_common::config::{ConfigOverrides, ConfigResolver};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for bloom-api
#[derive(Parser, Debug)]
#[command(name = "bloom-api")]
#[command(about = "BrandBloom Insights backend service")]
#[command(version)]
struct Args {
    /// Data root folder (uploads, metadata, analyses)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Python backend base URL
    #[arg(long)]
    python_url: Option<String>,

    /// Answer disk-backed routes with 501
    #[arg(long)]
    serverless: bool,
}

fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!(
        "bloom_api={level},bloom_common={level},tower_http={level}"
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise start at info and switch to the configured level once known
    let env_filter_set = std::env::var("RUST_LOG").is_ok();
    let initial_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter("info"));
    let (filter_layer, filter_handle) = reload::Layer::new(initial_filter);
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting BrandBloom API (bloom-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = ConfigResolver::new(ConfigOverrides {
        root_folder: args.root_folder,
        host: args.host,
        port: args.port,
        config_path: args.config,
        python_base_url: args.python_url,
        serverless: args.serverless.then_some(true),
    })
    .resolve();

    if !env_filter_set {
        filter_handle
            .reload(default_filter(&config.log_level))
            .context("Failed to apply configured log level")?;
    }

    info!("Root folder: {}", config.root_folder.display());
    info!("Python backend: {}", config.python_base_url);
    if config.serverless {
        info!("Serverless mode: disk-backed routes answer 501");
    } else {
        config
            .ensure_directories()
            .context("Failed to create data directories")?;
    }

    let bind_addr = config.bind_addr();
    let state = AppState::new(config).context("Failed to initialize application state")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("bloom-api listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("bloom-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
