//! Collector Layer
//!
//! Scheduled collection engine. Each task runs one [`Producer`] on its own
//! interval, aggregates the fetched records into labeled rows and atomically
//! publishes the result for the scrape endpoint.
//!
//! # Architecture
//!
//! - [`Producer`]: closed set of fetch-and-aggregate strategies
//! - [`CollectionTask`]: one producer, its schedule and its published snapshot
//! - [`Schedule`]: fixed interval or disabled
//! - [`Scheduler`]: owns the tasks, their jobs and graceful shutdown
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use azure_devops_exporter::api::{AzureDevOpsClient, DevOpsApi};
//! use azure_devops_exporter::collector::{CollectionTask, Producer, Scheduler, TaskConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AzureDevOpsClient::new("myorg", "token", Duration::from_secs(30))?;
//! let projects = client.list_projects().await?;
//!
//! let scheduler = Scheduler::new().await?;
//! let config = TaskConfig::new(Producer::General).with_interval(Duration::from_secs(15));
//! scheduler
//!     .register(CollectionTask::new(config, Arc::new(client), projects.into(), None))
//!     .await?;
//! scheduler.start().await?;
//! # Ok(())
//! # }
//! ```

mod producer;
mod schedule;
mod scheduler;
mod task;

pub use producer::{ProduceContext, Producer};
pub use schedule::{CollectorError, MIN_INTERVAL, Schedule};
pub use scheduler::{DEFAULT_SHUTDOWN_TIMEOUT, JobInfo, Scheduler};
pub use task::{
    CollectionTask, CycleOutcome, DEFAULT_CYCLE_TIMEOUT, TaskConfig, TaskState, TaskStatus,
};
