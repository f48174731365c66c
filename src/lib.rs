//! Azure DevOps Prometheus exporter
//!
//! Periodically polls the Azure DevOps REST API and republishes projects,
//! repositories, pull requests, builds, releases and agent pools as Prometheus
//! metrics. The crate can be embedded as a library or run through the
//! `azure-devops-exporter` binary.
//!
//! # Architecture
//!
//! - **API**: [`DevOpsApi`] capability and its `reqwest` implementation
//! - **Metrics**: content-hashed row aggregation, TTL cache and text rendering
//! - **Collectors**: independently scheduled producers publishing snapshots atomically
//! - **Server**: `/metrics`, probes and collector status over `axum`
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use azure_devops_exporter::{
//!     AppConfig, AzureDevOpsClient, CollectionTask, DevOpsApi, Scheduler,
//!     server::{AppState, create_router},
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load("exporter.yaml")?;
//! config.validate()?;
//!
//! let client = AzureDevOpsClient::new(
//!     &config.azure_devops.organisation,
//!     &config.azure_devops.access_token,
//!     config.azure_devops.request_timeout,
//! )?;
//! let projects: Arc<[_]> = client.list_projects().await?.into();
//! let api: Arc<dyn DevOpsApi> = Arc::new(client);
//!
//! let scheduler = Scheduler::new().await?;
//! for task in config.task_configs() {
//!     scheduler
//!         .register(CollectionTask::new(task, Arc::clone(&api), Arc::clone(&projects), None))
//!         .await?;
//! }
//! scheduler.start().await?;
//!
//! let app = create_router(AppState { scheduler: Arc::new(scheduler) });
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod collector;
pub mod config;
pub mod metrics;
pub mod server;

pub use api::{AzureDevOpsClient, DevOpsApi, FetchError};
pub use collector::{CollectionTask, CollectorError, Producer, Scheduler, TaskConfig};
pub use config::{AppConfig, ConfigError};
pub use metrics::{HashedAggregator, MetricRow, MetricsCache, Snapshot};
