//! Application configuration structures.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::{DEFAULT_API_URL, DEFAULT_RELEASE_API_URL};
use crate::collector::{DEFAULT_CYCLE_TIMEOUT, Producer, TaskConfig};
use crate::metrics::DEFAULT_CACHE_CAPACITY;

use super::validation::{ConfigError, expand_env_vars};

// =============================================================================
// Constants
// =============================================================================

/// Default scrape interval for collectors without their own (15 minutes).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Default interval of the general collector (15 seconds).
pub const DEFAULT_GENERAL_INTERVAL: Duration = Duration::from_secs(15);

/// Default interval of the latest-build and agent-pool collectors (30 seconds).
pub const DEFAULT_FAST_INTERVAL: Duration = Duration::from_secs(30);

/// Default timeout of a single REST request (30 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn default_interval() -> Duration {
    DEFAULT_INTERVAL
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_cycle_timeout() -> Duration {
    DEFAULT_CYCLE_TIMEOUT
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_release_api_url() -> String {
    DEFAULT_RELEASE_API_URL.to_string()
}

fn default_cache_capacity() -> u64 {
    DEFAULT_CACHE_CAPACITY
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address (default: "0.0.0.0").
    pub bind: String,

    /// Server port (default: 8080).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// Apply a `host:port` or `:port` listen address.
    pub fn set_listen(&mut self, listen: &str) -> Result<(), ConfigError> {
        let (host, port) = listen.rsplit_once(':').ok_or_else(|| {
            ConfigError::ValidationError(format!("invalid server bind address: '{}'", listen))
        })?;
        self.port = port.parse().map_err(|_| {
            ConfigError::ValidationError(format!("invalid server port: '{}'", port))
        })?;
        if !host.is_empty() {
            self.bind = host.trim_start_matches('[').trim_end_matches(']').to_string();
        }
        Ok(())
    }

    /// The socket address to listen on. IPv6 binds are stored without brackets.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.bind.parse().map_err(|_| {
            ConfigError::ValidationError(format!("invalid server bind address: '{}'", self.bind))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

// =============================================================================
// Azure DevOps Configuration
// =============================================================================

/// Organisation, credentials and endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureDevOpsConfig {
    /// Organisation name, as in `https://dev.azure.com/<organisation>`.
    #[serde(default)]
    pub organisation: String,

    /// Personal access token. `${VAR}` references are expanded on load.
    #[serde(default, skip_serializing)]
    pub access_token: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_release_api_url")]
    pub release_api_url: String,

    /// Timeout of each REST request (default: 30s).
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Agent pool ids to report; empty means all pools.
    #[serde(default)]
    pub agent_pool_filter: Vec<i64>,
}

impl Default for AzureDevOpsConfig {
    fn default() -> Self {
        Self {
            organisation: String::new(),
            access_token: String::new(),
            api_url: default_api_url(),
            release_api_url: default_release_api_url(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            agent_pool_filter: Vec::new(),
        }
    }
}

// =============================================================================
// Scrape Configuration
// =============================================================================

/// Per-collector intervals. An explicit `0s` disables a collector; an absent
/// value falls back as documented per field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Fallback interval (default: 15m).
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Upper bound of one collection cycle (default: 60s).
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Default: 15s.
    #[serde(with = "humantime_serde")]
    pub general: Option<Duration>,

    /// Falls back to `general`.
    #[serde(with = "humantime_serde")]
    pub project: Option<Duration>,

    #[serde(with = "humantime_serde")]
    pub pull_request: Option<Duration>,

    #[serde(with = "humantime_serde")]
    pub build: Option<Duration>,

    /// Default: 30s.
    #[serde(with = "humantime_serde")]
    pub latest_build: Option<Duration>,

    #[serde(with = "humantime_serde")]
    pub release: Option<Duration>,

    /// Default: 30s.
    #[serde(with = "humantime_serde")]
    pub agent_pool: Option<Duration>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            timeout: default_cycle_timeout(),
            general: Some(DEFAULT_GENERAL_INTERVAL),
            project: None,
            pull_request: None,
            build: None,
            latest_build: Some(DEFAULT_FAST_INTERVAL),
            release: None,
            agent_pool: Some(DEFAULT_FAST_INTERVAL),
        }
    }
}

impl ScrapeConfig {
    /// Effective interval of `producer`.
    pub fn interval_for(&self, producer: Producer) -> Duration {
        let own = match producer {
            Producer::General => self.general,
            Producer::Project => self.project.or(self.general),
            Producer::PullRequest => self.pull_request,
            Producer::Build => self.build,
            Producer::LatestBuild => self.latest_build,
            Producer::Release => self.release,
            Producer::AgentPool => self.agent_pool,
        };
        own.unwrap_or(self.interval)
    }

    /// Mutable slot of `producer`'s own interval.
    pub fn slot_mut(&mut self, producer: Producer) -> &mut Option<Duration> {
        match producer {
            Producer::General => &mut self.general,
            Producer::Project => &mut self.project,
            Producer::PullRequest => &mut self.pull_request,
            Producer::Build => &mut self.build,
            Producer::LatestBuild => &mut self.latest_build,
            Producer::Release => &mut self.release,
            Producer::AgentPool => &mut self.agent_pool,
        }
    }
}

// =============================================================================
// Cache Configuration
// =============================================================================

/// Snapshot cache used to survive failures right after a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of cached snapshots; `0s` disables the cache.
    #[serde(default, with = "humantime_serde")]
    pub ttl: Duration,

    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::ZERO,
            max_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Web server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub azure_devops: AzureDevOpsConfig,

    #[serde(default)]
    pub scrape: ScrapeConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// Not validated: CLI and environment overrides are applied on top first.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content)?;
        config.azure_devops.access_token = expand_env_vars(&config.azure_devops.access_token);
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.socket_addr()?;

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server port must be non-zero".to_string(),
            ));
        }

        if self.azure_devops.organisation.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "azure_devops organisation is required".to_string(),
            ));
        }

        if self.azure_devops.access_token.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "azure_devops access_token is required".to_string(),
            ));
        }

        if self.azure_devops.request_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "azure_devops request_timeout must be positive".to_string(),
            ));
        }

        if self.scrape.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "scrape timeout must be positive".to_string(),
            ));
        }

        if self.cache.is_enabled() && self.cache.max_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "cache max_capacity must be positive when the cache is enabled".to_string(),
            ));
        }

        Ok(())
    }

    /// One task per producer, with its effective interval.
    pub fn task_configs(&self) -> Vec<TaskConfig> {
        Producer::ALL
            .into_iter()
            .map(|producer| {
                let config = TaskConfig::new(producer)
                    .with_interval(self.scrape.interval_for(producer))
                    .with_timeout(self.scrape.timeout)
                    .with_cache_ttl(self.cache.ttl);
                match producer {
                    Producer::AgentPool => {
                        config.with_agent_pool_filter(self.azure_devops.agent_pool_filter.clone())
                    }
                    _ => config,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Schedule;
    use std::io::Write;

    fn valid() -> AppConfig {
        let mut config = AppConfig::default();
        config.azure_devops.organisation = "myorg".to_string();
        config.azure_devops.access_token = "secret".to_string();
        config
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_set_listen() {
        let mut config = ServerConfig::default();
        config.set_listen(":9090").unwrap();
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 9090);

        config.set_listen("127.0.0.1:8081").unwrap();
        assert_eq!(config.bind, "127.0.0.1");
        assert_eq!(config.port, 8081);

        assert!(config.set_listen("8080").is_err());
        assert!(config.set_listen("host:http").is_err());
    }

    #[test]
    fn test_set_listen_ipv6() {
        let mut config = ServerConfig::default();
        config.set_listen("[::1]:9090").unwrap();
        assert_eq!(config.bind, "::1");
        assert_eq!(
            config.socket_addr().unwrap(),
            "[::1]:9090".parse::<SocketAddr>().unwrap()
        );

        config.set_listen("[::]:8080").unwrap();
        assert_eq!(config.socket_addr().unwrap().to_string(), "[::]:8080");

        config.bind = "not-an-ip".to_string();
        assert!(config.socket_addr().is_err());
    }

    #[test]
    fn test_default_intervals() {
        let scrape = ScrapeConfig::default();
        assert_eq!(scrape.interval_for(Producer::General), Duration::from_secs(15));
        assert_eq!(scrape.interval_for(Producer::Project), Duration::from_secs(15));
        assert_eq!(scrape.interval_for(Producer::LatestBuild), Duration::from_secs(30));
        assert_eq!(scrape.interval_for(Producer::AgentPool), Duration::from_secs(30));
        assert_eq!(scrape.interval_for(Producer::Build), DEFAULT_INTERVAL);
        assert_eq!(scrape.interval_for(Producer::Release), DEFAULT_INTERVAL);
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_config_validation_missing_credentials() {
        let mut config = valid();
        config.azure_devops.organisation = " ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("organisation"));

        let mut config = valid();
        config.azure_devops.access_token.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("access_token"));
    }

    #[test]
    fn test_config_validation_invalid_port() {
        let mut config = valid();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_bind_address() {
        let mut config = valid();
        config.server.bind = "not-an-ip".to_string();

        let result = config.validate();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("invalid server bind address")
        );
    }

    #[test]
    fn test_config_validation_zero_request_timeout() {
        let mut config = valid();
        config.azure_devops.request_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
server:
  port: 9090
azure_devops:
  organisation: myorg
  access_token: "${{AZDO_TEST_MISSING_TOKEN:-from-default}}"
  agent_pool_filter: [7]
scrape:
  interval: 5m
  build: 0s
  release: 2m
cache:
  ttl: 10m
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.azure_devops.access_token, "from-default");
        assert_eq!(config.azure_devops.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.scrape.interval, Duration::from_secs(300));
        // unset fields keep their defaults
        assert_eq!(config.scrape.general, Some(DEFAULT_GENERAL_INTERVAL));
        assert_eq!(config.cache.ttl, Duration::from_secs(600));

        let tasks = config.task_configs();
        assert_eq!(tasks.len(), Producer::ALL.len());
        let by_producer = |p: Producer| tasks.iter().find(|t| t.producer() == p).unwrap();
        assert_eq!(by_producer(Producer::Build).schedule(), Schedule::Disabled);
        assert_eq!(
            by_producer(Producer::Release).schedule(),
            Schedule::Interval(Duration::from_secs(120))
        );
        assert_eq!(
            by_producer(Producer::PullRequest).schedule(),
            Schedule::Interval(Duration::from_secs(300))
        );
        assert_eq!(by_producer(Producer::AgentPool).agent_pool_filter(), &[7]);
        assert!(by_producer(Producer::General).agent_pool_filter().is_empty());
        assert_eq!(by_producer(Producer::General).cache_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn test_load_missing_file() {
        let result = AppConfig::load("/nonexistent/exporter.yaml");
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let result = AppConfig::from_yaml("scrape: [not, a, map]");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
