//! songbook-api - Singer and song catalog service
//!
//! Resolves configuration, opens (and migrates) the SQLite database, then
//! serves the HTTP API until Ctrl+C or SIGTERM.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use songbook_common::config::{Overrides, ServiceConfig};
use songbook_common::db::init_database;
use songbook_api::{build_router, AppState};
use tokio::signal;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for songbook-api
#[derive(Parser, Debug)]
#[command(name = "songbook-api")]
#[command(about = "Singer and song catalog service")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to the per-user songbook config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root folder holding the database (also SONGBOOK_ROOT_FOLDER)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Database file, absolute or relative to the root folder
    #[arg(short, long, env = "SONGBOOK_DATABASE")]
    database: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "SONGBOOK_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "SONGBOOK_PORT")]
    port: Option<u16>,

    /// Allow cross-origin requests from any origin
    #[arg(long)]
    cors: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ServiceConfig::resolve(Overrides {
        config_path: args.config,
        root_folder: args.root_folder,
        database_path: args.database,
        host: args.host,
        port: args.port,
        cors_permissive: args.cors,
    })
    .context("Failed to resolve configuration")?;

    // RUST_LOG wins over the configured filter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting songbook-api v{}", env!("CARGO_PKG_VERSION"));
    info!("Root folder: {}", config.root_folder.display());
    info!("Database path: {}", config.database_path.display());

    let pool = init_database(&config.database_path, config.busy_timeout_ms)
        .await
        .context("Failed to initialize database")?;

    let mut app = build_router(AppState::new(pool.clone()));
    if config.cors_permissive {
        info!("CORS: allowing any origin");
        app = app.layer(CorsLayer::permissive());
    }

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("songbook-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
