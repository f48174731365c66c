//! Collection tasks: one independently scheduled producer each.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

use crate::api::{DevOpsApi, FetchError, Project};
use crate::collector::producer::{ProduceContext, Producer};
use crate::collector::schedule::Schedule;
use crate::metrics::{MetricFamilies, MetricsCache, Snapshot};

/// Default timeout of one collection cycle.
pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Static settings of one collection task.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    name: String,
    producer: Producer,
    schedule: Schedule,
    timeout: Duration,
    agent_pool_filter: Vec<i64>,
    cache_ttl: Duration,
}

impl TaskConfig {
    /// Create a task config named after its producer, disabled until an
    /// interval is set.
    pub fn new(producer: Producer) -> Self {
        Self {
            name: producer.to_string(),
            producer,
            schedule: Schedule::Disabled,
            timeout: DEFAULT_CYCLE_TIMEOUT,
            agent_pool_filter: Vec::new(),
            cache_ttl: Duration::ZERO,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the interval. Zero disables the task.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.schedule = Schedule::interval(interval);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_agent_pool_filter(mut self, filter: Vec<i64>) -> Self {
        self.agent_pool_filter = filter;
        self
    }

    /// Lifetime of cached snapshots. Zero disables caching for this task.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn producer(&self) -> Producer {
        self.producer
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn agent_pool_filter(&self) -> &[i64] {
        &self.agent_pool_filter
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskState {
    Idle,
    Fetching,
    Publishing,
    FailedKeepStale,
}

/// Result of one call to [`CollectionTask::run_cycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A fresh snapshot was published.
    Published,
    /// The cycle failed; the previous (or cached) snapshot stays published.
    KeptStale,
    /// Another cycle of the same task was still running.
    Skipped,
}

#[derive(Debug, Default)]
struct Progress {
    last_error: Option<String>,
    last_success: Option<DateTime<Utc>>,
    last_duration: Duration,
    cycles: u64,
    up: bool,
}

/// Point-in-time view of a task, served by `/api/collectors`.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub name: String,
    pub producer: Producer,
    /// Humantime interval, or `"disabled"`.
    pub interval: String,
    pub state: TaskState,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_duration_seconds: f64,
    pub cycles: u64,
    pub up: bool,
    pub rows: usize,
}

/// One named producer with its own schedule and published snapshot.
///
/// Only its own timer drives [`run_cycle`](Self::run_cycle); scrapes read
/// [`snapshot`](Self::snapshot) concurrently and never see a partial cycle.
pub struct CollectionTask {
    config: TaskConfig,
    api: Arc<dyn DevOpsApi>,
    projects: Arc<[Project]>,
    cache: Option<MetricsCache>,
    published: ArcSwap<Snapshot>,
    has_published: AtomicBool,
    state: Mutex<TaskState>,
    progress: Mutex<Progress>,
    running: tokio::sync::Mutex<()>,
}

impl CollectionTask {
    pub fn new(
        config: TaskConfig,
        api: Arc<dyn DevOpsApi>,
        projects: Arc<[Project]>,
        cache: Option<MetricsCache>,
    ) -> Self {
        Self {
            config,
            api,
            projects,
            cache,
            published: ArcSwap::from_pointee(Snapshot::empty()),
            has_published: AtomicBool::new(false),
            state: Mutex::new(TaskState::Idle),
            progress: Mutex::new(Progress::default()),
            running: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        self.config.name()
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.published.load_full()
    }

    pub fn state(&self) -> TaskState {
        *self.state.lock()
    }

    /// Whether a snapshot (fresh or cached) has ever been published.
    pub fn has_published(&self) -> bool {
        self.has_published.load(Ordering::Acquire)
    }

    pub fn status(&self) -> TaskStatus {
        let progress = self.progress.lock();
        let interval = match self.config.schedule() {
            Schedule::Disabled => "disabled".to_string(),
            Schedule::Interval(d) => humantime::format_duration(d).to_string(),
        };
        TaskStatus {
            name: self.config.name().to_string(),
            producer: self.config.producer(),
            interval,
            state: self.state(),
            last_error: progress.last_error.clone(),
            last_success: progress.last_success,
            last_duration_seconds: progress.last_duration.as_secs_f64(),
            cycles: progress.cycles,
            up: progress.up,
            rows: self.published.load().row_count(),
        }
    }

    fn set_state(&self, state: TaskState) {
        *self.state.lock() = state;
    }

    fn publish(&self, snapshot: Snapshot) {
        self.published.store(Arc::new(snapshot));
        self.has_published.store(true, Ordering::Release);
    }

    /// Run one fetch-aggregate-publish cycle.
    ///
    /// Returns [`CycleOutcome::Skipped`] without doing anything while another
    /// cycle of this task is in flight.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Ok(_running) = self.running.try_lock() else {
            tracing::debug!(collector = %self.name(), "Previous cycle still running, skipping tick");
            return CycleOutcome::Skipped;
        };

        let name = self.config.name();
        let start = Instant::now();
        self.set_state(TaskState::Fetching);
        tracing::debug!(collector = %name, "Running collection");

        let families = MetricFamilies::new(self.config.producer.families(), self.cache.clone());
        let ctx = ProduceContext {
            api: self.api.as_ref(),
            projects: &self.projects,
            agent_pool_filter: &self.config.agent_pool_filter,
        };
        let result = tokio::time::timeout(
            self.config.timeout,
            self.config.producer.produce(ctx, &families),
        )
        .await
        .unwrap_or(Err(FetchError::Timeout(self.config.timeout)));

        let elapsed = start.elapsed();
        let outcome = match result {
            Ok(()) => {
                self.set_state(TaskState::Publishing);
                let snapshot = families.snapshot();
                let rows = snapshot.row_count();
                self.publish(snapshot);
                if !self.config.cache_ttl.is_zero() {
                    families.store_to_cache(name, self.config.cache_ttl);
                }

                let mut progress = self.progress.lock();
                progress.last_error = None;
                progress.last_success = Some(Utc::now());
                progress.up = true;
                tracing::debug!(collector = %name, duration_ms = elapsed.as_millis(), rows, "Collection succeeded");
                CycleOutcome::Published
            }
            Err(e) => {
                self.set_state(TaskState::FailedKeepStale);
                if e.is_transient() {
                    tracing::warn!(collector = %name, error = %e, "Collection failed, keeping previous metrics");
                } else {
                    tracing::error!(collector = %name, error = %e, "Collection failed, keeping previous metrics");
                }

                if !self.has_published() && families.load_from_cache(name) {
                    tracing::info!(collector = %name, "Seeded metrics from cache");
                    self.publish(families.snapshot());
                }

                let mut progress = self.progress.lock();
                progress.last_error = Some(e.to_string());
                progress.up = false;
                CycleOutcome::KeptStale
            }
        };

        {
            let mut progress = self.progress.lock();
            progress.cycles += 1;
            progress.last_duration = elapsed;
        }
        self.set_state(TaskState::Idle);
        outcome
    }
}

impl std::fmt::Debug for CollectionTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionTask")
            .field("name", &self.config.name)
            .field("producer", &self.config.producer)
            .field("schedule", &self.config.schedule)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockApi;

    fn projects() -> Arc<[Project]> {
        Arc::from(vec![Project::new("1", "P")])
    }

    fn general_task(api: Arc<MockApi>, cache: Option<MetricsCache>) -> CollectionTask {
        let config = TaskConfig::new(Producer::General)
            .with_interval(Duration::from_secs(15))
            .with_timeout(Duration::from_secs(5))
            .with_cache_ttl(Duration::from_secs(60));
        CollectionTask::new(config, api, projects(), cache)
    }

    #[test]
    fn test_task_config_defaults() {
        let config = TaskConfig::new(Producer::LatestBuild);
        assert_eq!(config.name(), "latest_build");
        assert_eq!(config.schedule(), Schedule::Disabled);
        assert_eq!(config.timeout(), DEFAULT_CYCLE_TIMEOUT);
        assert!(config.agent_pool_filter().is_empty());
        assert!(config.cache_ttl().is_zero());
    }

    #[tokio::test]
    async fn test_end_to_end_then_stale_on_failure() {
        let api = Arc::new(MockApi::with_projects(vec![Project::new("1", "P")]));
        let task = general_task(Arc::clone(&api), None);

        assert_eq!(task.run_cycle().await, CycleOutcome::Published);
        let first = task.snapshot();
        let rows = first.rows("azure_devops_general_project_info");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].labels["project"], "P");
        assert_eq!(rows[0].value, 1.0);
        assert!(task.status().up);

        api.set_failing(true);
        assert_eq!(task.run_cycle().await, CycleOutcome::KeptStale);

        assert_eq!(*task.snapshot(), *first);
        let status = task.status();
        assert!(!status.up);
        assert_eq!(status.cycles, 2);
        assert!(status.last_error.unwrap().contains("unexpected status 503"));
        assert_eq!(status.state, TaskState::Idle);
    }

    #[tokio::test]
    async fn test_recovery_clears_error() {
        let api = Arc::new(MockApi::with_projects(vec![Project::new("1", "P")]));
        let task = general_task(Arc::clone(&api), None);

        api.set_failing(true);
        task.run_cycle().await;
        assert!(!task.has_published());
        assert!(task.snapshot().is_empty());

        api.set_failing(false);
        assert_eq!(task.run_cycle().await, CycleOutcome::Published);
        assert!(task.has_published());
        assert!(task.status().last_error.is_none());
    }

    #[tokio::test]
    async fn test_cache_seeds_fresh_task() {
        let cache = MetricsCache::new(64);
        let api = Arc::new(MockApi::with_projects(vec![Project::new("1", "P")]));

        let warm = general_task(Arc::clone(&api), Some(cache.clone()));
        warm.run_cycle().await;
        let expected = warm.snapshot();

        // a restarted task sharing the cache whose first fetch fails
        let cold = general_task(Arc::clone(&api), Some(cache));
        api.set_failing(true);
        assert_eq!(cold.run_cycle().await, CycleOutcome::KeptStale);

        assert!(cold.has_published());
        assert_eq!(*cold.snapshot(), *expected);
        assert!(!cold.status().up);
    }

    #[tokio::test]
    async fn test_no_cache_without_ttl() {
        let cache = MetricsCache::new(64);
        let api = Arc::new(MockApi::with_projects(vec![Project::new("1", "P")]));
        let config = TaskConfig::new(Producer::General).with_interval(Duration::from_secs(15));
        let task = CollectionTask::new(config, api, projects(), Some(cache.clone()));

        task.run_cycle().await;
        assert_eq!(cache.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_overlapping_cycle_is_skipped() {
        let api = Arc::new(MockApi::with_projects(vec![Project::new("1", "P")]));
        api.set_delay(Duration::from_millis(200));
        let task = Arc::new(general_task(Arc::clone(&api), None));

        let first = tokio::spawn({
            let task = Arc::clone(&task);
            async move { task.run_cycle().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(task.state(), TaskState::Fetching);

        assert_eq!(task.run_cycle().await, CycleOutcome::Skipped);
        assert_eq!(first.await.unwrap(), CycleOutcome::Published);
        assert_eq!(api.calls(), 1);
        assert_eq!(task.status().cycles, 1);
    }

    #[tokio::test]
    async fn test_cycle_timeout_keeps_stale() {
        let api = Arc::new(MockApi::with_projects(vec![Project::new("1", "P")]));
        let config = TaskConfig::new(Producer::General)
            .with_interval(Duration::from_secs(15))
            .with_timeout(Duration::from_millis(50));
        let task = CollectionTask::new(config, Arc::clone(&api) as Arc<dyn DevOpsApi>, projects(), None);

        task.run_cycle().await;
        let before = task.snapshot();

        api.set_delay(Duration::from_millis(500));
        assert_eq!(task.run_cycle().await, CycleOutcome::KeptStale);
        assert_eq!(*task.snapshot(), *before);
        assert!(task.status().last_error.unwrap().contains("timeout elapsed"));
    }
}
