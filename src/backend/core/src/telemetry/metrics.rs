//! Prometheus metrics for job lifecycle, executions and schedule recovery.
//!
//! # Example
//!
//! ```rust,no_run
//! use hookcron_core::telemetry::metrics::JobMetrics;
//!
//! JobMetrics::record_execution("delivered", 0.125);
//! ```

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Deserialize;
use std::collections::HashMap;

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Whether the Prometheus recorder is installed
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    /// Histogram buckets for webhook durations (in seconds)
    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,

    /// Global labels to add to all metrics
    #[serde(default)]
    pub global_labels: HashMap<String, String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            duration_buckets: default_duration_buckets(),
            global_labels: HashMap::new(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_duration_buckets() -> Vec<f64> {
    vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
}

/// Handle to the installed recorder, rendered at `GET /metrics`.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    prometheus_handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("prometheus_handle", &self.prometheus_handle.is_some())
            .finish()
    }
}

impl MetricsRegistry {
    /// A registry with no exporter; `render` returns `None`.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.prometheus_handle.is_some()
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> Option<String> {
        self.prometheus_handle.as_ref().map(|h| h.render())
    }
}

/// Install the Prometheus recorder.
///
/// # Errors
///
/// Returns an error if the buckets are invalid or a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig, service_name: &str) -> anyhow::Result<MetricsRegistry> {
    if !config.enabled {
        return Ok(MetricsRegistry::disabled());
    }

    let mut builder = PrometheusBuilder::new();

    for (key, value) in &config.global_labels {
        builder = builder.add_global_label(key, value);
    }

    builder = builder.set_buckets(&config.duration_buckets)?;

    let handle = builder.install_recorder()?;

    register_metric_descriptions();

    tracing::info!(service_name = %service_name, "Metrics initialized");

    Ok(MetricsRegistry {
        prometheus_handle: Some(handle),
    })
}

fn register_metric_descriptions() {
    describe_counter!("hookcron_jobs_created_total", "Jobs created through the manager");
    describe_counter!("hookcron_jobs_deleted_total", "Jobs deleted through the manager");
    describe_counter!(
        "hookcron_executions_total",
        "Job executions by Trigger Action outcome"
    );
    describe_counter!(
        "hookcron_execution_skipped_total",
        "Firings skipped because the job was absent, inactive or already running"
    );
    describe_histogram!(
        "hookcron_notify_duration_seconds",
        "Webhook request duration in seconds"
    );
    describe_counter!(
        "hookcron_schedule_fallbacks_total",
        "Recoveries taken while computing a next run"
    );
    describe_counter!("hookcron_errors_total", "Errors by code and category");
    describe_gauge!(
        "hookcron_scheduled_jobs",
        "Jobs with a live scheduler registration on this instance"
    );
}

/// Job engine metrics.
pub struct JobMetrics;

impl JobMetrics {
    pub fn record_created() {
        counter!("hookcron_jobs_created_total").increment(1);
    }

    pub fn record_deleted() {
        counter!("hookcron_jobs_deleted_total").increment(1);
    }

    /// Record one execution and how long the webhook took.
    pub fn record_execution(outcome: &'static str, duration_seconds: f64) {
        counter!("hookcron_executions_total", "outcome" => outcome).increment(1);
        histogram!("hookcron_notify_duration_seconds").record(duration_seconds);
    }

    pub fn record_skipped(reason: &'static str) {
        counter!("hookcron_execution_skipped_total", "reason" => reason).increment(1);
    }

    pub fn record_fallback(step: &'static str) {
        counter!("hookcron_schedule_fallbacks_total", "step" => step).increment(1);
    }

    pub fn set_scheduled_jobs(count: usize) {
        gauge!("hookcron_scheduled_jobs").set(count as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_config_defaults() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert!(!config.duration_buckets.is_empty());
    }

    #[test]
    fn test_disabled_registry_renders_nothing() {
        let registry = init_metrics(
            &MetricsConfig {
                enabled: false,
                ..Default::default()
            },
            "test",
        )
        .unwrap();
        assert!(!registry.is_enabled());
        assert!(registry.render().is_none());
    }

    #[test]
    fn test_job_metrics_without_recorder() {
        // No recorder installed: calls are no-ops
        JobMetrics::record_created();
        JobMetrics::record_execution("delivered", 0.2);
        JobMetrics::record_fallback("time_zone");
        JobMetrics::set_scheduled_jobs(3);
    }
}
