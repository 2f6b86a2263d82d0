//! Telemetry: structured logging and Prometheus metrics.
//!
//! - **Logging**: JSON/pretty/compact output through `tracing-subscriber`
//! - **Metrics**: `metrics` facade counters with an optional Prometheus recorder
//!
//! # Example
//!
//! ```rust,no_run
//! use hookcron_core::telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::default();
//! let handle = init_telemetry(&config).expect("Failed to initialize telemetry");
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingConfig, SpanEventConfig};
pub use metrics::{init_metrics, JobMetrics, MetricsConfig, MetricsRegistry};

/// Unified telemetry configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name used in logs and metric labels
    pub service_name: String,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "hookcron".to_string(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl TelemetryConfig {
    pub fn from_app_config(config: &crate::config::Config) -> Self {
        Self {
            service_name: "hookcron".to_string(),
            logging: config.logging.clone(),
            metrics: config.metrics.clone(),
        }
    }
}

/// Initialize logging and metrics.
///
/// Should be called once at application startup.
///
/// # Errors
///
/// Returns an error if either component fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<MetricsRegistry> {
    // Logging first so metrics initialization is visible
    init_logging(&config.logging)?;

    let registry = init_metrics(&config.metrics, &config.service_name)?;

    Ok(registry)
}
