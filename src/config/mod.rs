//! Configuration module for the exporter.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Server settings (port, bind address)
//! - Azure DevOps organisation, token and endpoints
//! - Per-collector scrape intervals
//! - Snapshot cache

mod app;
mod validation;

pub use app::{AppConfig, AzureDevOpsConfig, CacheConfig, ScrapeConfig, ServerConfig};
pub use validation::{ConfigError, expand_env_vars, parse_duration, parse_id_list};

// Re-export constants
pub use app::{
    DEFAULT_FAST_INTERVAL, DEFAULT_GENERAL_INTERVAL, DEFAULT_INTERVAL, DEFAULT_REQUEST_TIMEOUT,
};
