//! Configuration errors and value parsers shared by the file and CLI layers.

use std::time::Duration;

use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Parse duration string using humantime.
///
/// Supports `30s`, `5m30s`, `1h`, `1d`, `100ms` and so on. `0s` is accepted
/// and disables the collector it is applied to.
///
/// # Examples
///
/// ```
/// use azure_devops_exporter::config::parse_duration;
///
/// assert_eq!(parse_duration("15s").unwrap().as_secs(), 15);
/// assert_eq!(parse_duration("15m").unwrap().as_secs(), 900);
/// assert!(parse_duration("0s").unwrap().is_zero());
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("duration string is empty".to_string());
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Parse a list of numeric ids separated by whitespace or commas.
///
/// ```
/// use azure_devops_exporter::config::parse_id_list;
///
/// assert_eq!(parse_id_list("7 12,3").unwrap(), vec![7, 12, 3]);
/// assert!(parse_id_list("").unwrap().is_empty());
/// ```
pub fn parse_id_list(s: &str) -> Result<Vec<i64>, ConfigError> {
    s.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>().map_err(|_| {
                ConfigError::ValidationError(format!("invalid agent pool id: '{}'", part))
            })
        })
        .collect()
}

/// Expand environment variables in a string.
/// Supports ${VAR} and ${VAR:-default} syntax.
pub fn expand_env_vars(input: &str) -> String {
    static ENV_VAR_REGEX: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();

    let regex = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("failed to compile env var regex")
    });

    regex
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_valid() {
        assert_eq!(parse_duration("15s").unwrap(), Duration::from_secs(15));
        assert_eq!(parse_duration(" 30m ").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("30").is_err());
    }

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list("7").unwrap(), vec![7]);
        assert_eq!(parse_id_list(" 1  2\t3 ").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_id_list("4,5").unwrap(), vec![4, 5]);

        let err = parse_id_list("7 pool").unwrap_err();
        assert!(err.to_string().contains("'pool'"));
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        let result = expand_env_vars("${NONEXISTENT_AZDO_TOKEN_12345:-fallback}");
        assert_eq!(result, "fallback");
    }

    #[test]
    fn test_expand_env_vars_from_env() {
        // SAFETY: This test runs in isolation and only modifies a test-specific variable.
        unsafe {
            std::env::set_var("AZDO_TEST_EXPAND_TOKEN", "pat-value");
        }
        assert_eq!(expand_env_vars("${AZDO_TEST_EXPAND_TOKEN}"), "pat-value");
        // SAFETY: Cleanup test variable.
        unsafe {
            std::env::remove_var("AZDO_TEST_EXPAND_TOKEN");
        }
    }

    #[test]
    fn test_expand_env_vars_literal_token() {
        assert_eq!(expand_env_vars("plain-token"), "plain-token");
    }
}
