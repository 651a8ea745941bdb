//! Process settings read from environment variables.
//!
//! `AppConfig` names the polled repository, the polling interval, the metrics backend
//! and whether the webhook ingress is started. A `.env` file is loaded by `main` first.

use crate::types::RepositoryIdentity;
use anyhow::{anyhow, Context};
use humanize_rs::ParseError;
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Where collected metrics are sent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Output {
    #[default]
    Console,
    Graphite,
    Influxdb,
}

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Metrics backend to send batches to.
    #[serde(default)]
    pub output: Output,

    /// Repository to poll, in "owner/name" form.
    #[serde(deserialize_with = "deserialize_repository")]
    pub repository: RepositoryIdentity,

    /// GitHub Personal Access Token. Takes precedence over `github_token_file`.
    pub github_token: Option<String>,

    /// File holding the GitHub token, read when `github_token` is not set.
    pub github_token_file: Option<PathBuf>,

    /// Base URL of the GitHub REST API.
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    /// Interval between two collection passes (e.g. "5m").
    /// When absent, a single pass is run and the process exits.
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    pub update_frequency: Option<Duration>,

    /// Upper bound for a single upstream page fetch.
    #[serde(default = "default_request_timeout", deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,

    /// `host:port` of the graphite plaintext listener.
    pub graphite_endpoint: Option<String>,

    /// Base URL of the InfluxDB HTTP API (e.g. "http://localhost:8086").
    pub influxdb_endpoint: Option<String>,
    pub influxdb_database: Option<String>,
    pub influxdb_username: Option<String>,
    pub influxdb_password: Option<String>,

    /// Port of the webhook ingress. The ingress is disabled when unset.
    pub webhook_port: Option<u16>,

    /// How long webhook delivery ids are remembered for de-duplication.
    #[serde(default = "default_dedup_ttl_seconds")]
    pub webhook_dedup_ttl_seconds: u64,
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_dedup_ttl_seconds() -> u64 {
    3600
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn webhook_dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.webhook_dedup_ttl_seconds)
    }

    /// Resolves the GitHub token, reading the token file if needed.
    ///
    /// An unreadable token file is an error; no token at all means anonymous access.
    pub fn github_token(&self) -> anyhow::Result<Option<String>> {
        if let Some(token) = &self.github_token {
            return Ok(Some(token.trim().to_string()));
        }

        match &self.github_token_file {
            Some(path) => {
                let content = std::fs::read_to_string(path).with_context(|| {
                    format!("failed to load github auth token file {}", path.display())
                })?;
                Ok(Some(content.trim().to_string()))
            }
            None => Ok(None),
        }
    }
}

/// Parses a humanized duration such as "5m" or "1h30m". A bare number is read as seconds.
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    match humanize_rs::duration::parse(s) {
        Ok(d) => Ok(d),
        Err(ParseError::MissingUnit) => u64::from_str(s)
            .map(Duration::from_secs)
            .map_err(|_| anyhow!("unsupported duration string '{s}'")),
        Err(e) => Err(anyhow!("invalid duration string '{s}': {e}")),
    }
}

fn deserialize_repository<'de, D>(deserializer: D) -> Result<RepositoryIdentity, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    RepositoryIdentity::parse(&s).map_err(serde::de::Error::custom)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

fn deserialize_optional_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    s.map(|s| parse_duration(&s).map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: &[&str] = &[
        "OUTPUT",
        "REPOSITORY",
        "GITHUB_TOKEN",
        "GITHUB_TOKEN_FILE",
        "GITHUB_API_URL",
        "UPDATE_FREQUENCY",
        "REQUEST_TIMEOUT",
        "GRAPHITE_ENDPOINT",
        "WEBHOOK_PORT",
        "WEBHOOK_DEDUP_TTL_SECONDS",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        clear_env();
        env::set_var("OUTPUT", "graphite");
        env::set_var("REPOSITORY", "docker/docker");
        env::set_var("GITHUB_TOKEN", "secret");
        env::set_var("UPDATE_FREQUENCY", "5m");
        env::set_var("REQUEST_TIMEOUT", "10s");
        env::set_var("GRAPHITE_ENDPOINT", "localhost:2003");
        env::set_var("WEBHOOK_PORT", "8080");

        let config = AppConfig::from_env().expect("Failed to load config");

        assert_eq!(config.output, Output::Graphite);
        assert_eq!(config.repository, RepositoryIdentity::new("docker", "docker"));
        assert_eq!(config.github_token().unwrap().as_deref(), Some("secret"));
        assert_eq!(config.update_frequency, Some(Duration::from_secs(300)));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.graphite_endpoint.as_deref(), Some("localhost:2003"));
        assert_eq!(config.webhook_port, Some(8080));
        assert_eq!(config.github_api_url, "https://api.github.com");
        assert_eq!(config.webhook_dedup_ttl(), Duration::from_secs(3600));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_env();
        env::set_var("REPOSITORY", "icecrime/octostats");

        let config = AppConfig::from_env().expect("Failed to load config");

        assert_eq!(config.output, Output::Console);
        assert_eq!(config.update_frequency, None);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.github_token().unwrap().is_none());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_missing_repository() {
        clear_env();
        let result = AppConfig::from_env();
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_config_malformed_repository() {
        clear_env();
        env::set_var("REPOSITORY", "not-a-repository");
        let result = AppConfig::from_env();
        assert!(result.is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_unknown_output() {
        clear_env();
        env::set_var("REPOSITORY", "docker/docker");
        env::set_var("OUTPUT", "statsd");
        let result = AppConfig::from_env();
        assert!(result.is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_token_file() {
        clear_env();
        let path = env::temp_dir().join(format!("octostats-token-{}", std::process::id()));
        std::fs::write(&path, "from-file\n").unwrap();
        env::set_var("REPOSITORY", "docker/docker");
        env::set_var("GITHUB_TOKEN_FILE", &path);

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.github_token().unwrap().as_deref(), Some("from-file"));

        std::fs::remove_file(&path).unwrap();
        assert!(config.github_token().is_err());
        clear_env();
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1h2m").unwrap(), Duration::from_secs(3720));
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert!(parse_duration("5 parsecs").is_err());
        assert!(parse_duration("-1m").is_err());
    }
}
