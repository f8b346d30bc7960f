//! ghcr-exporter binary entry point.
//!
//! Core functionality is provided by the `ghcr_exporter` library crate.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use ghcr_exporter::{
    collector::{CollectorContext, CollectorRegistry, spawn_package_groups},
    config::AppConfig,
    logging,
    metrics::ExporterMetrics,
    server::{AppState, create_router},
    version::VersionInfo,
};

/// Prometheus exporter for GitHub Container Registry package statistics
#[derive(Parser, Debug)]
#[command(name = "ghcr-exporter", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml", env = "CONFIG_PATH")]
    config: String,

    /// Build the configuration from GHCR_EXPORTER_* environment variables only
    #[arg(long, env = "GHCR_EXPORTER_CONFIG_FROM_ENV")]
    config_from_env: bool,

    /// Server bind address (overrides configuration)
    #[arg(long)]
    server_bind: Option<String>,

    /// Server port (overrides configuration)
    #[arg(long)]
    server_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = if cli.config_from_env {
        AppConfig::from_env()?
    } else {
        AppConfig::load(&cli.config)?
    };

    // Apply CLI overrides (CLI > config)
    if let Some(bind) = cli.server_bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.server_port {
        config.server.port = port;
    }
    config.validate()?;

    logging::init(&config.logging)?;

    let version = VersionInfo::current();
    tracing::info!(
        version = version.version,
        commit = version.commit,
        build_date = version.build_date,
        "Starting GHCR exporter"
    );
    if cli.config_from_env {
        tracing::info!("Configuration loaded from environment");
    } else {
        tracing::info!(path = %cli.config, "Configuration loaded from file");
    }
    tracing::info!(
        bind = %config.server.bind,
        port = config.server.port,
        packages = config.packages.len(),
        default_interval = %humantime::format_duration(config.metrics.default_interval),
        "Effective configuration"
    );

    // Metrics registry shared by every collector and the /metrics handler
    let metrics = Arc::new(ExporterMetrics::new(&config.metrics.namespace)?);
    metrics.set_exporter_info(&version);

    // Start one collection loop per package group
    let ctx = CollectorContext::from_config(&config, Arc::clone(&metrics))?;
    let registry = CollectorRegistry::new();
    let started = spawn_package_groups(&registry, &config, &ctx).await?;
    tracing::info!(collectors = started, "Collectors started");

    // Build Axum router
    let app = create_router(AppState::new(&config, metrics));

    // Parse bind address
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;

    tracing::info!("Web server listening on: http://{}", addr);
    tracing::info!("Press Ctrl+C to shutdown");

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM, then stop every collector.
async fn shutdown_signal(registry: CollectorRegistry) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }

    tracing::info!("Shutting down collectors...");
    if let Err(e) = registry.shutdown().await {
        tracing::error!("Failed to shutdown collectors: {}", e);
    }
}
