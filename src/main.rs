//! Azure DevOps exporter binary entry point.
//!
//! Core functionality is provided by the `azure_devops_exporter` library crate.

use std::sync::Arc;
use std::time::Duration;

use azure_devops_exporter::{
    api::{AzureDevOpsClient, DevOpsApi, Project},
    collector::{CollectionTask, Producer, Scheduler},
    config::{AppConfig, parse_duration, parse_id_list},
    metrics::MetricsCache,
    server::{AppState, create_router},
};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Azure DevOps Prometheus exporter
#[derive(Parser, Debug)]
#[command(name = "azure-devops-exporter", version, about, long_about = None)]
struct Cli {
    /// Path to an optional YAML configuration file
    #[arg(short, long, env = "EXPORTER_CONFIG")]
    config: Option<String>,

    /// Verbose logging (debug level unless RUST_LOG is set)
    #[arg(short, long, env = "VERBOSE")]
    verbose: bool,

    /// Server listen address, `host:port` or `:port`
    #[arg(long = "bind", env = "SERVER_BIND")]
    server_bind: Option<String>,

    /// Default scrape interval for collectors without their own
    #[arg(long, env = "SCRAPE_TIME", value_parser = parse_duration)]
    scrape_time: Option<Duration>,

    /// Scrape interval of the general collector (0 disables)
    #[arg(long, env = "SCRAPE_TIME_GENERAL", value_parser = parse_duration)]
    scrape_time_general: Option<Duration>,

    /// Scrape interval of the project collector (0 disables)
    #[arg(long, env = "SCRAPE_TIME_PROJECT", value_parser = parse_duration)]
    scrape_time_project: Option<Duration>,

    /// Scrape interval of the pull request collector (0 disables)
    #[arg(long, env = "SCRAPE_TIME_PULLREQUEST", value_parser = parse_duration)]
    scrape_time_pullrequest: Option<Duration>,

    /// Scrape interval of the build collector (0 disables)
    #[arg(long, env = "SCRAPE_TIME_BUILD", value_parser = parse_duration)]
    scrape_time_build: Option<Duration>,

    /// Scrape interval of the latest build collector (0 disables)
    #[arg(long, env = "SCRAPE_TIME_LATEST_BUILD", value_parser = parse_duration)]
    scrape_time_latest_build: Option<Duration>,

    /// Scrape interval of the release collector (0 disables)
    #[arg(long, env = "SCRAPE_TIME_RELEASE", value_parser = parse_duration)]
    scrape_time_release: Option<Duration>,

    /// Scrape interval of the agent pool collector (0 disables)
    #[arg(long, env = "SCRAPE_TIME_AGENTPOOL", value_parser = parse_duration)]
    scrape_time_agentpool: Option<Duration>,

    /// Azure DevOps personal access token
    #[arg(long, env = "AZURE_DEVOPS_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Azure DevOps organisation
    #[arg(long, env = "AZURE_DEVOPS_ORGANISATION")]
    organisation: Option<String>,

    /// Agent pool ids to report, space or comma separated (default: all)
    #[arg(long, env = "AZURE_DEVOPS_FILTER_AGENTPOOL")]
    filter_agentpool: Option<String>,

    /// Lifetime of cached snapshots (0 disables the cache)
    #[arg(long, env = "CACHE_TTL", value_parser = parse_duration)]
    cache_ttl: Option<Duration>,
}

impl Cli {
    /// Apply CLI/env overrides (CLI > ENV > config file).
    fn apply(self, config: &mut AppConfig) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(bind) = self.server_bind {
            config.server.set_listen(&bind)?;
        }
        if let Some(organisation) = self.organisation {
            config.azure_devops.organisation = organisation;
        }
        if let Some(token) = self.access_token {
            config.azure_devops.access_token = token;
        }
        if let Some(filter) = self.filter_agentpool {
            config.azure_devops.agent_pool_filter = parse_id_list(&filter)?;
        }
        if let Some(interval) = self.scrape_time {
            config.scrape.interval = interval;
        }
        if let Some(ttl) = self.cache_ttl {
            config.cache.ttl = ttl;
        }

        let per_producer = [
            (Producer::General, self.scrape_time_general),
            (Producer::Project, self.scrape_time_project),
            (Producer::PullRequest, self.scrape_time_pullrequest),
            (Producer::Build, self.scrape_time_build),
            (Producer::LatestBuild, self.scrape_time_latest_build),
            (Producer::Release, self.scrape_time_release),
            (Producer::AgentPool, self.scrape_time_agentpool),
        ];
        for (producer, interval) in per_producer {
            if let Some(interval) = interval {
                *config.scrape.slot_mut(producer) = Some(interval);
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "debug"
    } else {
        "info,azure_devops_exporter=debug"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Azure DevOps exporter");

    // Load configuration from file, if any
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };
    cli.apply(&mut config)?;
    config.validate()?;

    tracing::info!(
        "Server: {}:{}, Organisation: {}",
        config.server.bind,
        config.server.port,
        config.azure_devops.organisation,
    );

    // Build API client
    let client = AzureDevOpsClient::new(
        &config.azure_devops.organisation,
        &config.azure_devops.access_token,
        config.azure_devops.request_timeout,
    )?
    .with_api_url(&config.azure_devops.api_url)
    .with_release_api_url(&config.azure_devops.release_api_url);

    // Project list is fetched once; without it no collector has work to do
    let projects: Arc<[Project]> = client.list_projects().await?.into();
    tracing::info!("Found {} projects", projects.len());
    for project in projects.iter() {
        tracing::debug!(project_id = %project.id, project = %project.name, "Project");
    }

    let api: Arc<dyn DevOpsApi> = Arc::new(client);
    let cache = config
        .cache
        .is_enabled()
        .then(|| MetricsCache::new(config.cache.max_capacity));

    // Initialize scheduler
    tracing::info!("Starting collector scheduler...");
    let scheduler = Arc::new(Scheduler::new().await?);
    for task_config in config.task_configs() {
        let task = CollectionTask::new(
            task_config,
            Arc::clone(&api),
            Arc::clone(&projects),
            cache.clone(),
        );
        scheduler.register(task).await?;
    }
    scheduler.start().await?;

    // Build Axum router
    let app = create_router(AppState {
        scheduler: Arc::clone(&scheduler),
    });

    // Parse bind address
    let addr = config.server.socket_addr()?;

    tracing::info!("Web server listening on: http://{}/metrics", addr);
    tracing::info!("Press Ctrl+C to shutdown");

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(scheduler))
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal(scheduler: Arc<Scheduler>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }

    tracing::info!("Shutting down collectors...");
    if let Err(e) = scheduler.shutdown().await {
        tracing::error!("Failed to shutdown collectors: {}", e);
    }
}
