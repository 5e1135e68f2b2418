//! Model Server - Main entry point

use anyhow::{Context, Result};
use clap::Parser;
use model_server::{
    FsStorage, LoaderConfig, ModelCache, ModelLoader, ModelRegistry, StorageBackend, api,
    config::ServerConfig, metrics,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;

#[derive(Parser, Debug)]
#[command(name = "model-server")]
#[command(about = "ML model serving with an in-process model cache", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override API port
    #[arg(long)]
    port: Option<u16>,

    /// Override model cache size
    #[arg(long)]
    cache_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log format (json or pretty)
    #[arg(long, default_value = "json")]
    log_format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    match cli.log_format.as_str() {
        "pretty" => {
            tracing_subscriber::fmt()
                .with_env_filter(&cli.log_level)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(&cli.log_level)
                .json()
                .init();
        }
    }

    tracing::info!("Starting Model Server");

    // Load configuration
    let mut config = ServerConfig::load(cli.config)?;

    // CLI overrides
    if let Some(port) = cli.port {
        config.api_port = port;
    }
    if let Some(cache_size) = cli.cache_size {
        config.model_cache_size = cache_size;
    }

    config.validate()?;

    tracing::info!(
        api_port = config.api_port,
        upload_dir = ?config.upload_dir,
        model_cache_size = config.model_cache_size,
        load_timeout_secs = config.load_timeout_secs,
        "Configuration loaded"
    );

    // Setup metrics
    let prometheus_handle = metrics::setup_metrics()?;

    let storage: Arc<dyn StorageBackend> = Arc::new(FsStorage::with_root(&config.upload_dir));
    let loader = ModelLoader::with_config(
        storage.clone(),
        LoaderConfig {
            load_timeout_secs: config.load_timeout_secs,
        },
    );
    let cache = Arc::new(ModelCache::new(loader, config.model_cache_size));
    let registry = Arc::new(ModelRegistry::new());

    // Setup API
    let config = Arc::new(config);
    let app_state = api::AppState {
        config: config.clone(),
        registry,
        cache: cache.clone(),
        storage,
        prometheus_handle,
    };

    let app = api::create_router(app_state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.api_port));
    tracing::info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind API server")?;

    // Graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")?;

    tracing::info!("Shutting down...");
    cache.clear().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}
