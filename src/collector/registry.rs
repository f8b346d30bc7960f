//! Collector registry for managing collector lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::owner::OwnerCollector;
use super::package::PackageCollector;
use super::traits::{CollectionTarget, Collector, CollectorContext, CollectorError, effective_interval};
use crate::config::AppConfig;

/// Default timeout for graceful shutdown (5 seconds).
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Metadata about a registered job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    /// Collector name.
    pub name: String,
    /// Collector category ("package" or "owner").
    pub category: String,
    /// Effective interval between collections.
    pub interval: Duration,
}

/// Registry for managing multiple collector tasks.
///
/// Every collector runs in its own Tokio task: one collection immediately,
/// then one per interval. A single root `CancellationToken` stops all of
/// them, interrupting in-flight collections.
pub struct CollectorRegistry {
    tracker: TaskTracker,
    cancel: CancellationToken,
    jobs: Arc<RwLock<HashMap<String, JobInfo>>>,
}

impl CollectorRegistry {
    /// Create a new, empty collector registry.
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for CollectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field(
                "job_count",
                &self.jobs.try_read().map(|j| j.len()).unwrap_or(0),
            )
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl CollectorRegistry {
    /// Register a collector and start its collection loop.
    ///
    /// # Errors
    /// Returns `CollectorError::Scheduler` if a collector with the same name is
    /// already registered or the registry has been shut down.
    pub async fn spawn<C: Collector>(&self, collector: C) -> Result<JobInfo, CollectorError> {
        if self.cancel.is_cancelled() {
            return Err(CollectorError::Scheduler(
                "registry is shut down".to_string(),
            ));
        }

        let info = JobInfo {
            name: collector.name().to_string(),
            category: collector.category().to_string(),
            interval: effective_interval(collector.interval()),
        };

        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&info.name) {
            return Err(CollectorError::Scheduler(format!(
                "collector '{}' is already registered",
                info.name
            )));
        }

        self.tracker
            .spawn(run_loop(Arc::new(collector), info.interval, self.cancel.clone()));
        jobs.insert(info.name.clone(), info.clone());

        tracing::info!(
            collector = %info.name,
            category = %info.category,
            interval_secs = info.interval.as_secs(),
            "Collector registered"
        );
        Ok(info)
    }

    /// List all registered jobs.
    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        self.jobs
            .read()
            .await
            .values()
            .cloned()
            .collect()
    }

    /// Get the number of registered jobs.
    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Gracefully shutdown every collector with the default timeout.
    pub async fn shutdown(self) -> Result<(), CollectorError> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Shutdown with custom timeout.
    ///
    /// Tasks still running when the timeout elapses are left to be dropped
    /// with the runtime.
    pub async fn shutdown_with_timeout(self, timeout: Duration) -> Result<(), CollectorError> {
        let job_count = self.jobs.read().await.len();

        self.cancel.cancel();
        self.tracker.close();

        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => tracing::info!(job_count, "Collector scheduler shutdown complete"),
            Err(_) => tracing::warn!(
                job_count,
                remaining = self.tracker.len(),
                "Collector scheduler shutdown timed out"
            ),
        }
        Ok(())
    }
}

/// Collection loop of a single collector.
async fn run_loop<C: Collector>(collector: Arc<C>, interval: Duration, cancel: CancellationToken) {
    let name = collector.name();

    if run_collection(collector.as_ref(), &cancel).await {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if !run_collection(collector.as_ref(), &cancel).await {
                        break;
                    }
                }
            }
        }
    }

    tracing::debug!(collector = %name, "Collector loop stopped");
}

/// Execute a single collection cycle and log the outcome.
///
/// Returns `false` if the cycle was interrupted by cancellation.
async fn run_collection<C: Collector>(collector: &C, cancel: &CancellationToken) -> bool {
    let name = collector.name();
    tracing::debug!(collector = %name, category = %collector.category(), "Running collection");

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => return false,
        outcome = collector.collect(cancel) => outcome,
    };

    let duration_ms = outcome.duration.as_millis() as u64;
    if outcome.success {
        tracing::debug!(collector = %name, duration_ms, attempts = outcome.attempts, "Collection succeeded");
    } else {
        tracing::warn!(collector = %name, duration_ms, attempts = outcome.attempts, "Collection failed");
    }
    !cancel.is_cancelled()
}

/// Register one collector per configured package group.
///
/// Groups with a repository get a [`PackageCollector`], groups without one an
/// [`OwnerCollector`]. Returns the number of collectors started.
///
/// # Errors
/// Returns the first registration error.
pub async fn spawn_package_groups(
    registry: &CollectorRegistry,
    config: &AppConfig,
    ctx: &CollectorContext,
) -> Result<usize, CollectorError> {
    for group in &config.packages {
        let name = group.name();
        let interval = config.interval_for(group);

        match group.repo() {
            Some(repo) => {
                let target = CollectionTarget::new(&group.owner, repo, interval);
                registry
                    .spawn(PackageCollector::new(name, target, ctx.clone()))
                    .await?
            }
            None => {
                registry
                    .spawn(OwnerCollector::new(name, &group.owner, interval, ctx.clone()))
                    .await?
            }
        };
    }

    Ok(config.packages.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::collector::CollectionOutcome;
    use crate::config::PackageGroup;
    use crate::ghcr::{ApiClient, PageScraper, build_http_client};
    use crate::metrics::ExporterMetrics;

    /// A mock collector for testing.
    struct MockCollector {
        name: String,
        interval: Duration,
        runs: Arc<AtomicU32>,
        hang: bool,
    }

    impl MockCollector {
        fn new(name: &str, interval: Duration) -> (Self, Arc<AtomicU32>) {
            let runs = Arc::new(AtomicU32::new(0));
            let collector = Self {
                name: name.to_string(),
                interval,
                runs: runs.clone(),
                hang: false,
            };
            (collector, runs)
        }

        fn hanging(mut self) -> Self {
            self.hang = true;
            self
        }
    }

    #[async_trait::async_trait]
    impl Collector for MockCollector {
        fn name(&self) -> &str {
            &self.name
        }

        fn category(&self) -> &str {
            "test"
        }

        fn interval(&self) -> Duration {
            self.interval
        }

        async fn collect(&self, _cancel: &CancellationToken) -> CollectionOutcome {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                return std::future::pending::<CollectionOutcome>().await;
            }
            CollectionOutcome::new(true, Duration::ZERO, 1)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_collection_runs_immediately() {
        let registry = CollectorRegistry::new();
        let (collector, runs) = MockCollector::new("octo-app", Duration::from_secs(60));
        registry.spawn(collector).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        registry.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_collector_does_not_block_others() {
        let registry = CollectorRegistry::new();
        let (hung, hung_runs) = MockCollector::new("stuck", Duration::from_secs(1));
        let (healthy, healthy_runs) = MockCollector::new("healthy", Duration::from_secs(10));
        registry.spawn(hung.hanging()).await.unwrap();
        registry.spawn(healthy).await.unwrap();

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(hung_runs.load(Ordering::SeqCst), 1);
        assert_eq!(healthy_runs.load(Ordering::SeqCst), 4);

        // Shutdown must not wait out the hung collection.
        let start = Instant::now();
        registry
            .shutdown_with_timeout(Duration::from_secs(30))
            .await
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_clamped_to_minimum() {
        let registry = CollectorRegistry::new();
        let (collector, runs) = MockCollector::new("fast", Duration::from_millis(10));
        let info = registry.spawn(collector).await.unwrap();
        assert_eq!(info.interval, Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        registry.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_registry_lifecycle() {
        let registry = CollectorRegistry::new();
        let (collector, _) = MockCollector::new("test-collector", Duration::from_secs(60));

        // Spawn collector
        registry.spawn(collector).await.unwrap();
        assert_eq!(registry.job_count().await, 1);

        // Duplicate names are rejected
        let (duplicate, _) = MockCollector::new("test-collector", Duration::from_secs(30));
        let err = registry.spawn(duplicate).await.unwrap_err();
        assert!(err.to_string().contains("already registered"));

        // List jobs
        let jobs = registry.list_jobs().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "test-collector");
        assert_eq!(jobs[0].category, "test");
        assert_eq!(jobs[0].interval, Duration::from_secs(60));

        // Shutdown
        registry.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_spawn_after_shutdown_rejected() {
        let registry = CollectorRegistry::new();
        registry.cancel.cancel();

        let (collector, runs) = MockCollector::new("late", Duration::from_secs(60));
        let err = registry.spawn(collector).await.unwrap_err();
        assert!(err.to_string().contains("shut down"));
        assert_eq!(registry.job_count().await, 0);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_spawn_package_groups() {
        let mut config = AppConfig::default();
        config.packages = vec![
            PackageGroup::new("octo", Some("app")),
            PackageGroup::new("octo-org", None).with_interval(Duration::from_secs(300)),
        ];

        let http = build_http_client().unwrap();
        // No token: the first cycles fail before sending any request.
        let ctx = CollectorContext {
            api: ApiClient::new(http.clone(), "http://127.0.0.1:9", None),
            scraper: PageScraper::new(http, "http://127.0.0.1:9"),
            metrics: Arc::new(ExporterMetrics::new("ghcr").unwrap()),
        };

        let registry = CollectorRegistry::new();
        let count = spawn_package_groups(&registry, &config, &ctx).await.unwrap();
        assert_eq!(count, 2);

        let mut jobs = registry.list_jobs().await;
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(jobs[0].name, "octo-app");
        assert_eq!(jobs[0].category, "package");
        assert_eq!(jobs[0].interval, Duration::from_secs(30));
        assert_eq!(jobs[1].name, "octo-org-all");
        assert_eq!(jobs[1].category, "owner");
        assert_eq!(jobs[1].interval, Duration::from_secs(300));

        registry.shutdown().await.unwrap();
    }

    /// Spin until `done` holds without letting the paused clock auto-advance.
    async fn settle(done: impl Fn() -> bool) {
        for _ in 0..1_000_000 {
            if done() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("collection did not settle");
    }

    #[tokio::test(start_paused = true)]
    async fn test_owner_discovery_batches_packages_on_group_tick() {
        const PACKAGES: [&str; 3] = ["api", "web", "worker"];
        const TICKS: u64 = 3;

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octo/packages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(
                PACKAGES
                    .iter()
                    .map(|name| serde_json::json!({ "name": name, "version_count": 1 }))
                    .collect::<Vec<_>>()
            )))
            .expect(TICKS)
            .mount(&server)
            .await;
        for name in PACKAGES {
            Mock::given(method("GET"))
                .and(path(format!("/users/octo/packages/container/{name}")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!({ "name": name, "version_count": 1 })),
                )
                .expect(TICKS)
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path_regex(r"^/users/octo/packages/container/[a-z]+/versions$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/octo/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        // No client timeout: the paused clock must only move when advanced below.
        let http = reqwest::Client::new();
        let metrics = Arc::new(ExporterMetrics::new("ghcr").unwrap());
        let ctx = CollectorContext {
            api: ApiClient::new(http.clone(), &server.uri(), Some("t".to_string())),
            scraper: PageScraper::new(http, &server.uri()),
            metrics: Arc::clone(&metrics),
        };

        let registry = CollectorRegistry::new();
        registry
            .spawn(OwnerCollector::new("octo-all", "octo", Duration::from_secs(60), ctx))
            .await
            .unwrap();

        for tick in 1..=TICKS {
            if tick > 1 {
                tokio::time::advance(Duration::from_secs(60)).await;
            }
            settle(|| metrics.collection_success_count("octo-all", 60) == tick).await;

            // Discovered packages run inside the group's job, never as jobs of their own.
            assert_eq!(registry.job_count().await, 1);
            assert_eq!(metrics.owner_packages_collected("octo-all", 60), Some(3));
        }

        registry.shutdown().await.unwrap();
        // Each package info endpoint saw exactly one request per tick.
        server.verify().await;
    }
}
