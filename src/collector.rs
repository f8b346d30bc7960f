//! Collector Layer
//!
//! Periodic collection of GHCR package metrics. Each configured package group
//! gets its own collector running in its own Tokio task.
//!
//! # Architecture
//!
//! - [`Collector`]: Core trait for one schedulable collection cycle
//! - [`PackageCollector`]: Collects a single `owner/repo` package, wrapped in a [`RetryPolicy`]
//! - [`OwnerCollector`]: Discovers every container package of an owner and collects each one
//! - [`CollectorRegistry`]: Spawns one loop per collector and handles graceful shutdown
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use ghcr_exporter::collector::{CollectionTarget, CollectorContext, CollectorRegistry, PackageCollector};
//! use ghcr_exporter::ghcr::{ApiClient, PageScraper};
//! use ghcr_exporter::metrics::ExporterMetrics;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let http = ghcr_exporter::ghcr::build_http_client()?;
//! let ctx = CollectorContext {
//!     api: ApiClient::new(http.clone(), "https://api.github.com", Some("token".into())),
//!     scraper: PageScraper::new(http, "https://github.com"),
//!     metrics: Arc::new(ExporterMetrics::new("ghcr")?),
//! };
//! let target = CollectionTarget::new("octo", "app", Duration::from_secs(60));
//! let registry = CollectorRegistry::new();
//! registry.spawn(PackageCollector::new("octo-app", target, ctx)).await?;
//! # Ok(())
//! # }
//! ```

mod owner;
mod package;
mod registry;
mod retry;
mod traits;
mod updater;

pub use owner::OwnerCollector;
pub use package::{PackageCollector, collect_package_metrics};
pub use registry::{CollectorRegistry, DEFAULT_SHUTDOWN_TIMEOUT, JobInfo, spawn_package_groups};
pub use retry::{RetryError, RetryPolicy};
pub use traits::{
    CollectionOutcome, CollectionTarget, Collector, CollectorContext, CollectorError,
    DiscoverySummary, DownloadStat, MIN_INTERVAL, effective_interval,
};
pub use updater::{last_published, update_package_metrics};
