//! Single package collection cycle.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::retry::RetryPolicy;
use super::traits::{
    CollectionOutcome, CollectionTarget, Collector, CollectorContext, CollectorError, DownloadStat,
};
use super::updater::update_package_metrics;
use crate::ghcr::ScrapeError;

/// Fetch and record one package: info, versions, download count, then metrics.
///
/// Only the package info request is mandatory. A failed version listing is
/// treated as an empty list and a failed scrape as an unavailable count.
///
/// # Errors
/// - `CollectorError::MissingToken` if no API token is configured
/// - any error from the package info request, in which case nothing is written
pub async fn collect_package_metrics(
    ctx: &CollectorContext,
    target: &CollectionTarget,
    cancel: &CancellationToken,
) -> Result<(), CollectorError> {
    let (owner, repo) = (target.owner.as_str(), target.repo.as_str());
    let span = info_span!("collect_package", owner, repo);

    async {
        if !ctx.api.has_token() {
            return Err(CollectorError::MissingToken);
        }

        let info = ctx.api.get_package_info(owner, repo, cancel).await?;

        let versions = match ctx.api.get_package_versions(owner, repo, cancel).await {
            Ok(versions) => versions,
            Err(CollectorError::Cancelled) => return Err(CollectorError::Cancelled),
            Err(e) => {
                warn!(error = %e, "Failed to fetch package versions, continuing without them");
                Vec::new()
            }
        };

        let downloads = match ctx.scraper.scrape_download_count(owner, repo, cancel).await {
            Ok(count) => DownloadStat::Count(count),
            Err(ScrapeError::Cancelled) => return Err(CollectorError::Cancelled),
            Err(e) => {
                warn!(error = %e, "Download statistics unavailable");
                DownloadStat::Unavailable
            }
        };

        update_package_metrics(&ctx.metrics, target, &info, &versions, downloads);
        Ok(())
    }
    .instrument(span)
    .await
}

/// Collector for one explicitly configured `owner/repo` package.
///
/// Each cycle runs [`collect_package_metrics`] under a [`RetryPolicy`].
pub struct PackageCollector {
    name: String,
    target: CollectionTarget,
    ctx: CollectorContext,
    retry: RetryPolicy,
}

impl PackageCollector {
    /// Create a collector named `name` (the `repo` label of its collection metrics).
    pub fn new(name: impl Into<String>, target: CollectionTarget, ctx: CollectorContext) -> Self {
        Self {
            name: name.into(),
            target,
            ctx,
            retry: RetryPolicy::default(),
        }
    }

    /// Set the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl std::fmt::Debug for PackageCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageCollector")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Collector for PackageCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> &str {
        "package"
    }

    fn interval(&self) -> Duration {
        self.target.interval
    }

    async fn collect(&self, cancel: &CancellationToken) -> CollectionOutcome {
        let start = Instant::now();
        let interval_secs = self.target.interval_secs();

        let result = self
            .retry
            .run(cancel, |attempt| async move {
                collect_package_metrics(&self.ctx, &self.target, cancel)
                    .await
                    .map(|()| attempt + 1)
            })
            .await;
        let duration = start.elapsed();

        match result {
            Ok(attempts) => {
                self.ctx
                    .metrics
                    .record_collection_success(&self.name, interval_secs, duration);
                info!(
                    name = %self.name,
                    owner = %self.target.owner,
                    repo = %self.target.repo,
                    attempts,
                    duration_ms = duration.as_millis() as u64,
                    "Package collection completed"
                );
                CollectionOutcome::new(true, duration, attempts)
            }
            Err(e) if matches!(e.source, CollectorError::Cancelled) => {
                debug!(name = %self.name, "Package collection cancelled");
                CollectionOutcome::new(false, duration, e.attempts)
            }
            Err(e) => {
                self.ctx
                    .metrics
                    .record_collection_failure(&self.name, interval_secs);
                error!(
                    name = %self.name,
                    owner = %self.target.owner,
                    repo = %self.target.repo,
                    attempts = e.attempts,
                    error = %e.source,
                    "Package collection failed"
                );
                CollectionOutcome::new(false, duration, e.attempts)
            }
        }
    }
}
