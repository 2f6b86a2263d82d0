use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Serialize;

use super::{ApiResponse, AppState};
use crate::error::HookcronError;
use crate::jobs::{CreateJobRequest, JobId, ServiceStatus, UpdateJobRequest};

fn parse_id(raw: &str) -> Result<JobId, HookcronError> {
    raw.parse::<JobId>()
        .map_err(|_| HookcronError::validation(format!("'{}' is not a valid job id", raw)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Health & Status
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthBody {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: String,
    #[serde(flatten)]
    snapshot: ServiceStatus,
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.manager.status();
    Json(HealthBody {
        status: if snapshot.initialized { "ok" } else { "initializing" },
        service: "hookcron",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
        snapshot,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    #[serde(flatten)]
    snapshot: ServiceStatus,
    mode: String,
    uptime_secs: i64,
    timestamp: String,
}

pub async fn service_status(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();
    Json(ApiResponse::success(StatusBody {
        snapshot: state.manager.status(),
        mode: state.manager.mode().to_string(),
        uptime_secs: (now - state.started_at).num_seconds(),
        timestamp: now.to_rfc3339(),
    }))
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error_with_code(
                "Metrics exporter is disabled",
                "MetricsDisabled",
            )),
        )
            .into_response(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job Handlers
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(state.manager.list_jobs()))
}

pub async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> Result<impl IntoResponse, HookcronError> {
    let job = state.manager.create_job(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(job))))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HookcronError> {
    let id = parse_id(&id)?;
    let job = state
        .manager
        .get_job(id)
        .ok_or_else(|| HookcronError::job_not_found(id))?;

    Ok(Json(ApiResponse::success(job)))
}

pub async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateJobRequest>,
) -> Result<impl IntoResponse, HookcronError> {
    let id = parse_id(&id)?;
    let job = state
        .manager
        .update_job(id, request)
        .await?
        .ok_or_else(|| HookcronError::job_not_found(id))?;

    Ok(Json(ApiResponse::success(job)))
}

pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HookcronError> {
    let id = parse_id(&id)?;
    if !state.manager.delete_job(id).await? {
        return Err(HookcronError::job_not_found(id));
    }

    Ok(Json(ApiResponse::success(serde_json::json!({
        "id": id,
        "deleted": true,
    }))))
}
