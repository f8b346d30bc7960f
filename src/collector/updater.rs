//! Maps fetched package data onto the exported gauges.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::traits::{CollectionTarget, DownloadStat};
use crate::ghcr::{PackageInfo, PackageVersion};
use crate::metrics::ExporterMetrics;

/// Most recent `created_at` among `versions`.
///
/// Versions without a timestamp, or with one that is not valid RFC 3339, are skipped.
pub fn last_published(versions: &[PackageVersion]) -> Option<DateTime<Utc>> {
    versions
        .iter()
        .filter_map(|v| {
            let raw = v.created_at.as_deref()?;
            match DateTime::parse_from_rfc3339(raw) {
                Ok(ts) => Some(ts.with_timezone(&Utc)),
                Err(e) => {
                    debug!(version = %v.name, created_at = raw, error = %e, "Skipping unparsable version timestamp");
                    None
                }
            }
        })
        .max()
}

/// Write one package observation.
///
/// The version count and the download count (or its `-1` sentinel) are always
/// overwritten; the last-published gauge is left untouched when no version
/// carries a usable timestamp.
pub fn update_package_metrics(
    metrics: &ExporterMetrics,
    target: &CollectionTarget,
    info: &PackageInfo,
    versions: &[PackageVersion],
    downloads: DownloadStat,
) {
    let (owner, repo) = (target.owner.as_str(), target.repo.as_str());

    if let Some(published) = last_published(versions) {
        metrics.set_last_published(owner, repo, published);
    }
    metrics.set_package_versions(owner, repo, info.version_count);
    metrics.set_package_downloads(owner, repo, downloads.gauge_value());

    debug!(
        owner,
        repo,
        versions = info.version_count,
        downloads = downloads.gauge_value(),
        "Updated package metrics"
    );
}
