//! Owner-wide package discovery.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::package::collect_package_metrics;
use super::traits::{
    CollectionOutcome, CollectionTarget, Collector, CollectorContext, CollectorError,
    DiscoverySummary, effective_interval,
};
use crate::ghcr::PackageInfo;

/// Collector for a group without an explicit repository.
///
/// Every cycle lists the owner's container packages and collects each of them
/// in turn, on the group's own tick.
pub struct OwnerCollector {
    name: String,
    owner: String,
    interval: Duration,
    ctx: CollectorContext,
}

impl OwnerCollector {
    /// Create a collector named `name` for every package of `owner`.
    pub fn new(
        name: impl Into<String>,
        owner: impl Into<String>,
        interval: Duration,
        ctx: CollectorContext,
    ) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            interval: effective_interval(interval),
            ctx,
        }
    }

    /// List the owner's packages, falling back to the organization listing.
    async fn discover(&self, cancel: &CancellationToken) -> Result<Vec<PackageInfo>, CollectorError> {
        if !self.ctx.api.has_token() {
            return Err(CollectorError::MissingToken);
        }

        match self.ctx.api.list_owner_packages(&self.owner, cancel).await {
            Ok(packages) => Ok(packages),
            Err(e) if !should_try_org_listing(&e) => Err(e),
            Err(e) => {
                debug!(owner = %self.owner, error = %e, "User package listing failed, trying organization listing");
                self.ctx.api.list_org_packages(&self.owner, cancel).await
            }
        }
    }

    fn cancelled(&self, start: Instant, attempts: u32) -> CollectionOutcome {
        debug!(name = %self.name, "Owner discovery cancelled");
        CollectionOutcome::new(false, start.elapsed(), attempts)
    }
}

/// The organization listing is worth a try unless the failure already came
/// from the organization namespace or cannot be fixed by another request.
fn should_try_org_listing(err: &CollectorError) -> bool {
    match err {
        CollectorError::Cancelled | CollectorError::MissingToken => false,
        CollectorError::Status { url, .. } => !url.contains("/orgs/"),
        _ => true,
    }
}

impl std::fmt::Debug for OwnerCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerCollector")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Collector for OwnerCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> &str {
        "owner"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn collect(&self, cancel: &CancellationToken) -> CollectionOutcome {
        let start = Instant::now();
        let interval_secs = self.interval.as_secs();
        let span = info_span!("discover_owner", name = %self.name, owner = %self.owner);

        async {
            info!("Starting owner package discovery");

            let packages = match self.discover(cancel).await {
                Ok(packages) => packages,
                Err(CollectorError::Cancelled) => return self.cancelled(start, 1),
                Err(e) => {
                    error!(error = %e, "Failed to list owner packages");
                    self.ctx
                        .metrics
                        .record_collection_failure(&self.name, interval_secs);
                    return CollectionOutcome::new(false, start.elapsed(), 1);
                }
            };
            info!(package_count = packages.len(), "Discovered packages for owner");

            let mut summary = DiscoverySummary {
                total: packages.len(),
                successful: 0,
            };
            for package in &packages {
                let target = CollectionTarget::new(&self.owner, &package.name, self.interval);
                match collect_package_metrics(&self.ctx, &target, cancel).await {
                    Ok(()) => summary.successful += 1,
                    Err(CollectorError::Cancelled) => return self.cancelled(start, 1),
                    Err(e) => {
                        warn!(package = %package.name, error = %e, "Failed to collect metrics for discovered package");
                    }
                }
            }

            let duration = start.elapsed();
            self.ctx
                .metrics
                .record_collection_success(&self.name, interval_secs, duration);
            self.ctx.metrics.record_discovery(
                &self.name,
                interval_secs,
                summary.total,
                summary.successful,
            );
            info!(
                total_packages = summary.total,
                successful_collections = summary.successful,
                duration_ms = duration.as_millis() as u64,
                "Owner package discovery completed"
            );

            CollectionOutcome::new(true, duration, 1).with_discovery(summary)
        }
        .instrument(span)
        .await
    }
}
