//! REST surface for the job manager.
//!
//! # Routes
//!
//! - `GET /health` - liveness plus the service status snapshot
//! - `GET /status` - service status with uptime
//! - `GET /metrics` - Prometheus text (when the exporter is enabled)
//! - `GET|POST /api/v1/jobs`
//! - `GET|PATCH|DELETE /api/v1/jobs/:id`
//!
//! Every JSON body is wrapped in [`ApiResponse`]; failures render the
//! structured error body from [`HookcronError`](crate::error::HookcronError).

mod handlers;

use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::jobs::JobManager;
use crate::telemetry::MetricsRegistry;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<JobManager>,
    pub metrics: MetricsRegistry,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(manager: Arc<JobManager>, metrics: MetricsRegistry) -> Self {
        Self {
            manager,
            metrics,
            started_at: Utc::now(),
        }
    }
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::service_status))
        .route("/metrics", get(handlers::prometheus_metrics))
        .route(
            "/api/v1/jobs",
            get(handlers::list_jobs).post(handlers::create_job),
        )
        .route(
            "/api/v1/jobs/:id",
            get(handlers::get_job)
                .patch(handlers::update_job)
                .delete(handlers::delete_job),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// API response wrapper.
#[derive(serde::Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_code: None,
        }
    }

    pub fn error_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            error_code: Some(code.into()),
        }
    }
}
