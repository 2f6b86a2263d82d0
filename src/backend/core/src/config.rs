//! Configuration management.

use config::builder::{ConfigBuilder, DefaultState};
use serde::Deserialize;

use crate::telemetry::{LoggingConfig, MetricsConfig};

/// Environment variable that points at an explicit config file.
pub const CONFIG_PATH_ENV: &str = "HOOKCRON_CONFIG";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Cluster mode and broker configuration
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Trigger Action (webhook) configuration
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Schedule calculation configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    /// Run against a shared broker instead of local timers
    #[serde(default)]
    pub enabled: bool,

    /// Redis host
    #[serde(default = "default_redis_host")]
    pub redis_host: String,

    /// Redis port
    #[serde(default = "default_redis_port")]
    pub redis_port: u16,

    /// Optional Redis password
    #[serde(default)]
    pub redis_password: Option<String>,

    /// Upper bound on the startup connection attempt
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Name of the shared queue
    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    /// Prefix for every broker key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Firings processed concurrently by this instance
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// Interval between promotion passes and idle polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Completed/failed firing records kept per bucket
    #[serde(default = "default_retention")]
    pub retention: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            redis_host: default_redis_host(),
            redis_port: default_redis_port(),
            redis_password: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            queue_name: default_queue_name(),
            key_prefix: default_key_prefix(),
            worker_concurrency: default_worker_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            retention: default_retention(),
        }
    }
}

impl ClusterConfig {
    /// Redis connection URL built from host, port and password.
    pub fn redis_url(&self) -> String {
        match &self.redis_password {
            Some(password) if !password.is_empty() => {
                format!("redis://:{}@{}:{}", password, self.redis_host, self.redis_port)
            }
            _ => format!("redis://{}:{}", self.redis_host, self.redis_port),
        }
    }

    /// Address for logs (never includes the password).
    pub fn redis_address(&self) -> String {
        format!("{}:{}", self.redis_host, self.redis_port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_notifier_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every webhook
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_notifier_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Zone substituted when a job's time zone does not resolve
    #[serde(default = "default_time_zone")]
    pub default_time_zone: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_time_zone: default_time_zone(),
        }
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 4000 }
fn default_redis_host() -> String { "localhost".to_string() }
fn default_redis_port() -> u16 { 6379 }
fn default_connect_timeout_secs() -> u64 { 10 }
fn default_queue_name() -> String { "cron-jobs".to_string() }
fn default_key_prefix() -> String { "hookcron".to_string() }
fn default_worker_concurrency() -> usize { 4 }
fn default_poll_interval_ms() -> u64 { 1000 }
fn default_retention() -> usize { 10 }
fn default_notifier_timeout_secs() -> u64 { 10 }
fn default_user_agent() -> String { format!("hookcron/{}", env!("CARGO_PKG_VERSION")) }
fn default_time_zone() -> String { "UTC".to_string() }

impl Config {
    /// Load configuration from `hookcron.toml` (or `$HOOKCRON_CONFIG`) and the environment.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "hookcron".to_string());
        let required = std::env::var(CONFIG_PATH_ENV).is_ok();

        Self::assemble(
            config::Config::builder().add_source(config::File::with_name(&path).required(required)),
        )
    }

    /// Load from a specific file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        Self::assemble(config::Config::builder().add_source(config::File::with_name(path)))
    }

    /// Layer the environment over `builder` and deserialize. Malformed values fail.
    fn assemble(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
        let config = builder
            .add_source(config::Environment::with_prefix("HOOKCRON").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.bind_address(), "0.0.0.0:4000");
        assert!(!config.cluster.enabled);
        assert_eq!(config.cluster.queue_name, "cron-jobs");
        assert_eq!(config.cluster.retention, 10);
        assert_eq!(config.notifier.timeout_secs, 10);
        assert!(config.notifier.user_agent.starts_with("hookcron/"));
        assert_eq!(config.scheduler.default_time_zone, "UTC");
    }

    #[test]
    fn test_redis_url() {
        let mut cluster = ClusterConfig::default();
        assert_eq!(cluster.redis_url(), "redis://localhost:6379");

        cluster.redis_password = Some("s3cret".to_string());
        cluster.redis_host = "broker".to_string();
        assert_eq!(cluster.redis_url(), "redis://:s3cret@broker:6379");
        assert_eq!(cluster.redis_address(), "broker:6379");
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let raw = config::Config::builder()
            .set_override("cluster.enabled", true)
            .unwrap()
            .set_override("server.port", 8081)
            .unwrap()
            .build()
            .unwrap();

        let cfg: Config = raw.try_deserialize().unwrap();
        assert!(cfg.cluster.enabled);
        assert_eq!(cfg.server.port, 8081);
        assert_eq!(cfg.cluster.redis_port, 6379);
        assert_eq!(cfg.notifier.timeout_secs, 10);
    }

    #[test]
    fn test_malformed_value_fails_to_load() {
        let source = config::File::from_str(
            "[cluster]\nenabled = \"sometimes\"\n",
            config::FileFormat::Toml,
        );
        let result = Config::assemble(config::Config::builder().add_source(source));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_explicit_file_fails_to_load() {
        assert!(Config::from_file("/nonexistent/hookcron-config").is_err());
    }
}
