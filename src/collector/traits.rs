//! Core collector traits and types.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::ghcr::{self, ApiClient, PageScraper};
use crate::metrics::ExporterMetrics;

/// Minimum allowed interval (1 second).
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Sentinel exported when the download count could not be scraped.
/// Using -1 to distinguish from a valid count of 0.
const UNAVAILABLE_DOWNLOADS: i64 = -1;

/// Errors that can occur during collection.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Transport error (DNS, connect, timeout, reset).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API request to {url} failed with status {status}")]
    Status { status: u16, url: String },

    /// The response body was not the expected JSON.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// No API token is configured.
    #[error("GitHub token required to access package information")]
    MissingToken,

    /// The shutdown signal fired while the operation was in flight.
    #[error("collection cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Scheduler error.
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

impl CollectorError {
    /// Whether a whole collection cycle should be attempted again after this error.
    ///
    /// Precondition failures and cancellation are final.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::MissingToken | Self::Cancelled | Self::Config(_) | Self::Scheduler(_)
        )
    }
}

/// Clamp a collection interval to [`MIN_INTERVAL`].
pub fn effective_interval(interval: Duration) -> Duration {
    if interval < MIN_INTERVAL {
        tracing::warn!(min_interval = ?MIN_INTERVAL, requested = ?interval,
            "Interval duration is less than minimum allowed. Using minimum duration."
        );
        MIN_INTERVAL
    } else {
        interval
    }
}

/// A resolved `owner/repo` package and the interval it is polled at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionTarget {
    pub owner: String,
    pub repo: String,
    pub interval: Duration,
}

impl CollectionTarget {
    /// Create a new target. The interval is clamped to [`MIN_INTERVAL`].
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, interval: Duration) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            interval: effective_interval(interval),
        }
    }

    /// Interval in whole seconds, used as the `interval` label value.
    pub fn interval_secs(&self) -> u64 {
        self.interval.as_secs()
    }
}

/// Scraped download count, or the explicit absence of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStat {
    Count(i64),
    Unavailable,
}

impl DownloadStat {
    /// Value written to the downloads gauge.
    pub fn gauge_value(self) -> i64 {
        match self {
            Self::Count(n) => n,
            Self::Unavailable => UNAVAILABLE_DOWNLOADS,
        }
    }
}

/// Package counts of one owner discovery sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiscoverySummary {
    pub total: usize,
    pub successful: usize,
}

/// Result of one collection cycle.
#[derive(Debug, Clone)]
pub struct CollectionOutcome {
    pub success: bool,
    pub duration: Duration,
    pub completed_at: DateTime<Utc>,
    /// Number of times the cycle body ran (1 when no retry was needed).
    pub attempts: u32,
    /// Set by owner discovery cycles.
    pub discovery: Option<DiscoverySummary>,
}

impl CollectionOutcome {
    pub(crate) fn new(success: bool, duration: Duration, attempts: u32) -> Self {
        Self {
            success,
            duration,
            completed_at: Utc::now(),
            attempts,
            discovery: None,
        }
    }

    pub(crate) fn with_discovery(mut self, summary: DiscoverySummary) -> Self {
        self.discovery = Some(summary);
        self
    }
}

/// Everything a collection cycle needs: the API client, the page scraper and
/// the metrics sink.
#[derive(Debug, Clone)]
pub struct CollectorContext {
    pub api: ApiClient,
    pub scraper: PageScraper,
    pub metrics: Arc<ExporterMetrics>,
}

impl CollectorContext {
    /// Build the shared HTTP client and wire it to the configured endpoints.
    ///
    /// # Errors
    /// Returns `CollectorError::Config` if the HTTP client cannot be built.
    pub fn from_config(
        config: &AppConfig,
        metrics: Arc<ExporterMetrics>,
    ) -> Result<Self, CollectorError> {
        let http = ghcr::build_http_client()
            .map_err(|e| CollectorError::Config(format!("failed to build HTTP client: {e}")))?;
        let token = config.github.token.expose().map(str::to_owned);

        Ok(Self {
            api: ApiClient::new(http.clone(), &config.github.api_url, token),
            scraper: PageScraper::new(http, &config.github.web_url),
            metrics,
        })
    }
}

/// Core collector trait for implementing a schedulable collection cycle.
///
/// # Error Handling Philosophy
///
/// Failing to reach the registry is a valid observation, not a collector
/// error: `collect()` records failure counters itself and reports it through
/// [`CollectionOutcome::success`]. The scheduler only logs the outcome.
#[async_trait::async_trait]
pub trait Collector: Send + Sync + 'static {
    /// Unique name of this collector, also the `repo` label of its collection metrics.
    fn name(&self) -> &str;

    /// Category for logging (e.g., "package", "owner").
    fn category(&self) -> &str;

    /// Interval between collections.
    fn interval(&self) -> Duration;

    /// Perform one collection cycle.
    ///
    /// Implementations must stop promptly once `cancel` fires.
    async fn collect(&self, cancel: &CancellationToken) -> CollectionOutcome;
}
