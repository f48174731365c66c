//! Scheduler owning every collection task and its timer job.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::collector::schedule::{CollectorError, Schedule};
use crate::collector::task::{CollectionTask, TaskStatus};
use crate::metrics::{self, ExportError, MetricDesc, MetricFamilies, Snapshot, labels};

/// Default timeout for graceful shutdown (5 seconds).
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

static COLLECTOR_UP: MetricDesc = MetricDesc::gauge(
    "azure_devops_exporter_collector_up",
    "Whether the last collection cycle succeeded",
    &["collector"],
);

static COLLECTOR_DURATION: MetricDesc = MetricDesc::gauge(
    "azure_devops_exporter_collector_last_duration_seconds",
    "Duration of the last collection cycle",
    &["collector"],
);

static COLLECTOR_CYCLES: MetricDesc = MetricDesc::counter(
    "azure_devops_exporter_collector_cycles_total",
    "Collection cycles run",
    &["collector"],
);

static SELF_FAMILIES: [&MetricDesc; 3] = [&COLLECTOR_UP, &COLLECTOR_DURATION, &COLLECTOR_CYCLES];

/// Metadata about a registered job.
#[derive(Debug, Clone)]
pub struct JobInfo {
    /// Job UUID.
    pub id: uuid::Uuid,
    /// Collector name.
    pub name: String,
    /// Schedule description.
    pub schedule: String,
}

/// Runs every enabled [`CollectionTask`] on its own repeated job and merges
/// their published snapshots for the scrape endpoint.
pub struct Scheduler {
    scheduler: JobScheduler,
    tasks: RwLock<Vec<Arc<CollectionTask>>>,
    jobs: RwLock<HashMap<uuid::Uuid, JobInfo>>,
}

impl Scheduler {
    pub async fn new() -> Result<Self, CollectorError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| CollectorError::Scheduler(e.to_string()))?;

        Ok(Self {
            scheduler,
            tasks: RwLock::new(Vec::new()),
            jobs: RwLock::new(HashMap::new()),
        })
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field(
                "job_count",
                &self.jobs.try_read().map(|j| j.len()).unwrap_or(0),
            )
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Register a task and create its job.
    ///
    /// Disabled tasks are kept for status reporting but never get a job;
    /// `None` is returned for them.
    pub async fn register(
        &self,
        task: impl Into<Arc<CollectionTask>>,
    ) -> Result<Option<uuid::Uuid>, CollectorError> {
        let task = task.into();
        let name = task.name().to_string();
        let schedule = task.config().schedule();

        let job_id = match schedule {
            Schedule::Disabled => {
                tracing::info!(collector = %name, "Collector disabled (interval 0)");
                None
            }
            Schedule::Interval(period) => {
                let job = create_job(Arc::clone(&task), period)?;
                let job_id = self
                    .scheduler
                    .add(job)
                    .await
                    .map_err(|e| CollectorError::Scheduler(e.to_string()))
                    .inspect_err(|e| {
                        tracing::error!(collector = %name, error = %e, "Job registration failed")
                    })?;

                self.jobs.write().await.insert(
                    job_id,
                    JobInfo {
                        id: job_id,
                        name: name.clone(),
                        schedule: schedule.to_string(),
                    },
                );
                tracing::info!(collector = %name, job_id = %job_id, schedule = %schedule, "Collector registered");
                Some(job_id)
            }
        };

        self.tasks.write().await.push(task);
        Ok(job_id)
    }

    /// Start every job and kick off a first cycle of each enabled task.
    ///
    /// Repeated jobs first fire one interval after start; the immediate cycle
    /// keeps slow collectors from serving nothing until then.
    pub async fn start(&self) -> Result<(), CollectorError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| CollectorError::Scheduler(e.to_string()))?;

        for task in self.enabled_tasks().await {
            tokio::spawn(async move {
                task.run_cycle().await;
            });
        }
        tracing::info!("Collector scheduler started");
        Ok(())
    }

    /// List all registered jobs.
    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        self.jobs.read().await.values().cloned().collect()
    }

    /// Get the number of registered jobs.
    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    async fn enabled_tasks(&self) -> Vec<Arc<CollectionTask>> {
        self.tasks
            .read()
            .await
            .iter()
            .filter(|task| task.config().schedule().is_enabled())
            .cloned()
            .collect()
    }

    /// Published snapshots of all enabled tasks, in registration order.
    pub async fn gather(&self) -> Vec<Arc<Snapshot>> {
        self.enabled_tasks()
            .await
            .iter()
            .map(|task| task.snapshot())
            .collect()
    }

    pub async fn statuses(&self) -> Vec<TaskStatus> {
        self.tasks.read().await.iter().map(|task| task.status()).collect()
    }

    /// Ready once every enabled task has published at least once.
    pub async fn is_ready(&self) -> bool {
        self.enabled_tasks().await.iter().all(|task| task.has_published())
    }

    /// Names of enabled tasks that have not published yet.
    pub async fn pending(&self) -> Vec<String> {
        self.enabled_tasks()
            .await
            .iter()
            .filter(|task| !task.has_published())
            .map(|task| task.name().to_string())
            .collect()
    }

    /// Render the union of all published rows plus collector self-metrics.
    pub async fn render(&self) -> Result<String, ExportError> {
        let tasks = self.enabled_tasks().await;

        let health = MetricFamilies::new(&SELF_FAMILIES, None);
        for task in &tasks {
            let status = task.status();
            let collector = labels([("collector", status.name)]);
            health.record_value(&COLLECTOR_UP, collector.clone(), if status.up { 1.0 } else { 0.0 });
            health.record_value(&COLLECTOR_DURATION, collector.clone(), status.last_duration_seconds);
            health.record_value(&COLLECTOR_CYCLES, collector, status.cycles as f64);
        }
        let health = health.snapshot();

        let snapshots: Vec<Arc<Snapshot>> = tasks.iter().map(|task| task.snapshot()).collect();
        let families = snapshots
            .iter()
            .flat_map(|snapshot| snapshot.families.iter())
            .chain(health.families.iter());
        metrics::render(families)
    }

    /// Gracefully shutdown the scheduler with default timeout.
    pub async fn shutdown(&self) -> Result<(), CollectorError> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Shutdown with custom timeout. In-flight cycles are abandoned.
    pub async fn shutdown_with_timeout(&self, timeout: Duration) -> Result<(), CollectorError> {
        let mut scheduler = self.scheduler.clone();
        let job_count = self.jobs.read().await.len();

        match tokio::time::timeout(timeout, scheduler.shutdown()).await {
            Ok(Ok(())) => {
                tracing::info!(job_count, "Collector scheduler shutdown complete");
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::error!(job_count, error = %e, "Collector scheduler shutdown failed");
                Err(CollectorError::Scheduler(e.to_string()))
            }
            Err(_) => {
                tracing::warn!(job_count, "Collector scheduler shutdown timed out");
                Ok(())
            }
        }
    }
}

fn create_job(task: Arc<CollectionTask>, period: Duration) -> Result<Job, CollectorError> {
    Job::new_repeated_async(period, move |_: uuid::Uuid, _: JobScheduler| {
        let task = Arc::clone(&task);
        Box::pin(async move {
            task.run_cycle().await;
        }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
    })
    .map_err(|e| CollectorError::Scheduler(e.to_string()))
}
