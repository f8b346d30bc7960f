//! Prometheus metrics exported by the collectors.
//!
//! All series live in one [`ExporterMetrics`] owning its own `Registry`; it is
//! built once at startup and shared by `Arc` between every collection loop and
//! the `/metrics` handler. Metric names are prefixed with the configured
//! namespace (`ghcr` by default).

use std::time::Duration;

use chrono::{DateTime, Utc};
use prometheus::{
    Encoder, GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::version::VersionInfo;

const PACKAGE_LABELS: &[&str] = &["owner", "repo"];
const COLLECTION_LABELS: &[&str] = &["repo", "interval"];
const INFO_LABELS: &[&str] = &["version", "commit", "build_date"];

/// Description of one exported metric, listed on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricInfo {
    pub name: String,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

impl MetricInfo {
    /// Comma-separated label names.
    pub fn label_list(&self) -> String {
        self.labels.join(", ")
    }
}

/// Every metric the exporter publishes.
pub struct ExporterMetrics {
    namespace: String,
    registry: Registry,
    catalogue: Vec<MetricInfo>,

    package_versions: IntGaugeVec,
    package_downloads: IntGaugeVec,
    package_last_published: GaugeVec,

    collection_success: IntCounterVec,
    collection_failed: IntCounterVec,
    collection_interval: IntGaugeVec,
    collection_duration: GaugeVec,
    collection_timestamp: GaugeVec,

    owner_packages_discovered: IntGaugeVec,
    owner_packages_collected: IntGaugeVec,

    exporter_info: IntGaugeVec,
}

/// Registers vectors while recording their catalogue entries.
struct Builder<'a> {
    namespace: &'a str,
    registry: Registry,
    catalogue: Vec<MetricInfo>,
}

impl Builder<'_> {
    fn opts(&mut self, name: &str, help: &'static str, labels: &'static [&'static str]) -> Opts {
        self.catalogue.push(MetricInfo {
            name: format!("{}_{}", self.namespace, name),
            help,
            labels,
        });
        Opts::new(name, help).namespace(self.namespace)
    }

    fn int_gauge(
        &mut self,
        name: &str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> prometheus::Result<IntGaugeVec> {
        let vec = IntGaugeVec::new(self.opts(name, help, labels), labels)?;
        self.registry.register(Box::new(vec.clone()))?;
        Ok(vec)
    }

    fn gauge(
        &mut self,
        name: &str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> prometheus::Result<GaugeVec> {
        let vec = GaugeVec::new(self.opts(name, help, labels), labels)?;
        self.registry.register(Box::new(vec.clone()))?;
        Ok(vec)
    }

    fn counter(
        &mut self,
        name: &str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> prometheus::Result<IntCounterVec> {
        let vec = IntCounterVec::new(self.opts(name, help, labels), labels)?;
        self.registry.register(Box::new(vec.clone()))?;
        Ok(vec)
    }
}

impl ExporterMetrics {
    /// Create and register every metric under `namespace`.
    ///
    /// # Errors
    /// Returns a `prometheus::Error` if the namespace is not a valid metric name prefix.
    pub fn new(namespace: &str) -> prometheus::Result<Self> {
        let mut b = Builder {
            namespace,
            registry: Registry::new(),
            catalogue: Vec::new(),
        };

        let package_versions = b.int_gauge(
            "package_versions",
            "Number of published versions of the package",
            PACKAGE_LABELS,
        )?;
        let package_downloads = b.int_gauge(
            "package_downloads",
            "Total downloads of the package, -1 when unavailable",
            PACKAGE_LABELS,
        )?;
        let package_last_published = b.gauge(
            "package_last_published_timestamp",
            "Unix timestamp of the most recently created package version",
            PACKAGE_LABELS,
        )?;
        let collection_success = b.counter(
            "collection_success_total",
            "Number of successful collection cycles",
            COLLECTION_LABELS,
        )?;
        let collection_failed = b.counter(
            "collection_failed_total",
            "Number of failed collection cycles",
            COLLECTION_LABELS,
        )?;
        let collection_interval = b.int_gauge(
            "collection_interval_seconds",
            "Configured collection interval in seconds",
            COLLECTION_LABELS,
        )?;
        let collection_duration = b.gauge(
            "collection_duration_seconds",
            "Duration of the last collection cycle in seconds",
            COLLECTION_LABELS,
        )?;
        let collection_timestamp = b.gauge(
            "collection_timestamp",
            "Unix timestamp of the last successful collection cycle",
            COLLECTION_LABELS,
        )?;
        let owner_packages_discovered = b.int_gauge(
            "owner_packages_discovered",
            "Packages found by the last owner discovery",
            COLLECTION_LABELS,
        )?;
        let owner_packages_collected = b.int_gauge(
            "owner_packages_collected",
            "Packages collected successfully by the last owner discovery",
            COLLECTION_LABELS,
        )?;
        let exporter_info = b.int_gauge(
            "exporter_info",
            "Build information of the exporter, always 1",
            INFO_LABELS,
        )?;

        Ok(Self {
            namespace: namespace.to_string(),
            registry: b.registry,
            catalogue: b.catalogue,
            package_versions,
            package_downloads,
            package_last_published,
            collection_success,
            collection_failed,
            collection_interval,
            collection_duration,
            collection_timestamp,
            owner_packages_discovered,
            owner_packages_collected,
            exporter_info,
        })
    }

    /// Every registered metric, in registration order.
    pub fn catalogue(&self) -> &[MetricInfo] {
        &self.catalogue
    }

    // ========================================================================
    // Package observations
    // ========================================================================

    pub fn set_package_versions(&self, owner: &str, repo: &str, count: i64) {
        self.package_versions
            .with_label_values(&[owner, repo])
            .set(count);
    }

    pub fn set_package_downloads(&self, owner: &str, repo: &str, count: i64) {
        self.package_downloads
            .with_label_values(&[owner, repo])
            .set(count);
    }

    pub fn set_last_published(&self, owner: &str, repo: &str, at: DateTime<Utc>) {
        self.package_last_published
            .with_label_values(&[owner, repo])
            .set(at.timestamp() as f64);
    }

    pub fn package_versions(&self, owner: &str, repo: &str) -> Option<i64> {
        self.sample("package_versions", &[("owner", owner), ("repo", repo)])
            .map(|v| v as i64)
    }

    pub fn package_downloads(&self, owner: &str, repo: &str) -> Option<i64> {
        self.sample("package_downloads", &[("owner", owner), ("repo", repo)])
            .map(|v| v as i64)
    }

    pub fn last_published(&self, owner: &str, repo: &str) -> Option<f64> {
        self.sample(
            "package_last_published_timestamp",
            &[("owner", owner), ("repo", repo)],
        )
    }

    // ========================================================================
    // Collection observations
    // ========================================================================

    /// Record a successful cycle of collector `repo` polled every `interval_secs`.
    pub fn record_collection_success(&self, repo: &str, interval_secs: u64, duration: Duration) {
        let interval = interval_secs.to_string();
        let labels = [repo, interval.as_str()];

        self.collection_success.with_label_values(&labels).inc();
        self.collection_interval
            .with_label_values(&labels)
            .set(i64::try_from(interval_secs).unwrap_or(i64::MAX));
        self.collection_duration
            .with_label_values(&labels)
            .set(duration.as_secs_f64());
        self.collection_timestamp
            .with_label_values(&labels)
            .set(Utc::now().timestamp() as f64);
    }

    pub fn record_collection_failure(&self, repo: &str, interval_secs: u64) {
        let interval = interval_secs.to_string();
        self.collection_failed
            .with_label_values(&[repo, interval.as_str()])
            .inc();
    }

    pub fn record_discovery(&self, repo: &str, interval_secs: u64, total: usize, successful: usize) {
        let interval = interval_secs.to_string();
        let labels = [repo, interval.as_str()];

        self.owner_packages_discovered
            .with_label_values(&labels)
            .set(i64::try_from(total).unwrap_or(i64::MAX));
        self.owner_packages_collected
            .with_label_values(&labels)
            .set(i64::try_from(successful).unwrap_or(i64::MAX));
    }

    /// Successful cycles of collector `repo`; zero if none were recorded.
    pub fn collection_success_count(&self, repo: &str, interval_secs: u64) -> u64 {
        let interval = interval_secs.to_string();
        self.sample(
            "collection_success_total",
            &[("repo", repo), ("interval", interval.as_str())],
        )
        .map_or(0, |v| v as u64)
    }

    /// Failed cycles of collector `repo`; zero if none were recorded.
    pub fn collection_failed_count(&self, repo: &str, interval_secs: u64) -> u64 {
        let interval = interval_secs.to_string();
        self.sample(
            "collection_failed_total",
            &[("repo", repo), ("interval", interval.as_str())],
        )
        .map_or(0, |v| v as u64)
    }

    pub fn owner_packages_collected(&self, repo: &str, interval_secs: u64) -> Option<i64> {
        let interval = interval_secs.to_string();
        self.sample(
            "owner_packages_collected",
            &[("repo", repo), ("interval", interval.as_str())],
        )
        .map(|v| v as i64)
    }

    /// Publish the constant `exporter_info` series.
    pub fn set_exporter_info(&self, info: &VersionInfo) {
        self.exporter_info
            .with_label_values(&[info.version, info.commit, info.build_date])
            .set(1);
    }

    /// Value of series `name` with exactly `labels`, as it appears in the
    /// exposition text. `None` when the series was never written.
    ///
    /// Reading never creates a series, so unobserved packages stay absent
    /// from `/metrics`.
    pub fn sample(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let mut pairs = labels.to_vec();
        pairs.sort_unstable();
        let labels = pairs
            .iter()
            .map(|(k, v)| format!("{k}=\"{v}\""))
            .collect::<Vec<_>>()
            .join(",");
        let prefix = format!("{}_{name}{{{labels}}} ", self.namespace);

        let text = self.encode().ok()?;
        text.lines()
            .find_map(|line| line.strip_prefix(prefix.as_str()))
            .and_then(|value| value.trim().parse().ok())
    }

    /// Render the registry in the Prometheus text exposition format.
    ///
    /// # Errors
    /// Returns a `prometheus::Error` if encoding fails.
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for ExporterMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExporterMetrics")
            .field("namespace", &self.namespace)
            .field("metrics", &self.catalogue.len())
            .finish_non_exhaustive()
    }
}
