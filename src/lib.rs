//! ghcr-exporter - GitHub Container Registry metrics exporter
//!
//! This crate polls the GHCR hosting API (and, for download counts, the public
//! package page) on a fixed interval per configured package group and exposes
//! the results in the Prometheus text format. It can be used as a library or
//! run as the standalone `ghcr-exporter` binary.
//!
//! # Architecture
//!
//! - **GHCR**: API client with user → organization namespace fallback, and the
//!   best-effort download-count page scraper
//! - **Collector**: package and owner-discovery collection cycles, retry policy,
//!   metrics updater and the per-group scheduler
//! - **Metrics**: Prometheus registry shared by every collection loop
//! - **Presentation**: `/metrics`, `/health` and an HTML dashboard
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ghcr_exporter::collector::{CollectorContext, CollectorRegistry, spawn_package_groups};
//! use ghcr_exporter::config::AppConfig;
//! use ghcr_exporter::metrics::ExporterMetrics;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load("config.yaml")?;
//! let metrics = Arc::new(ExporterMetrics::new(&config.metrics.namespace)?);
//! let ctx = CollectorContext::from_config(&config, metrics)?;
//!
//! let registry = CollectorRegistry::new();
//! spawn_package_groups(&registry, &config, &ctx).await?;
//! // ... serve /metrics, then on shutdown:
//! registry.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod ghcr;
pub mod logging;
pub mod metrics;
pub mod server;
pub mod version;

pub use collector::{
    CollectionOutcome, CollectionTarget, Collector, CollectorContext, CollectorError,
    CollectorRegistry, DownloadStat, OwnerCollector, PackageCollector, RetryPolicy,
};
pub use config::{AppConfig, ConfigError, PackageGroup};
pub use ghcr::{ApiClient, PackageInfo, PackageVersion, PageScraper, ScrapeError};
pub use metrics::ExporterMetrics;
