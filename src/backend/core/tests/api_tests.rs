//! Integration tests for the REST surface.
//!
//! Tests cover:
//! - Health and status endpoints
//! - Job CRUD through the router
//! - Clearing a job body with an explicit null
//! - Error bodies and status codes (validation, not found, bad ids)
//! - Metrics endpoint when the exporter is disabled

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use hookcron_core::api::{build_router, AppState};
use hookcron_core::jobs::{HttpMethod, JobManager, ManualClock, NotifyOutcome, TriggerAction};
use hookcron_core::telemetry::MetricsRegistry;

struct NoopTrigger;

#[async_trait]
impl TriggerAction for NoopTrigger {
    async fn notify(&self, _uri: &str, _method: HttpMethod, _body: Option<&str>) -> NotifyOutcome {
        NotifyOutcome::Delivered { status: 204 }
    }
}

fn app() -> Router {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 2, 0).unwrap(),
    ));
    let manager = JobManager::builder()
        .clock(clock)
        .trigger(Arc::new(NoopTrigger))
        .build()
        .unwrap();

    build_router(AppState::new(Arc::new(manager), MetricsRegistry::disabled()))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn new_job(schedule: &str) -> Value {
    json!({
        "uri": "http://x/hook",
        "httpMethod": "POST",
        "body": "{\"ping\":true}",
        "schedule": schedule,
        "timeZone": "UTC",
    })
}

// ============================================================================
// Health & Status
// ============================================================================

#[tokio::test]
async fn test_health_reports_ok() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "hookcron");
    assert_eq!(body["initialized"], true);
    assert_eq!(body["clusterMode"], false);
}

#[tokio::test]
async fn test_status_wraps_snapshot() {
    let app = app();
    send(&app, Method::POST, "/api/v1/jobs", Some(new_job("*/5 * * * *"))).await;

    let (status, body) = send(&app, Method::GET, "/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["mode"], "local");
    assert_eq!(body["data"]["activeLocalTaskCount"], 1);
}

// ============================================================================
// Jobs
// ============================================================================

#[tokio::test]
async fn test_create_returns_created_job() {
    let app = app();
    let (status, body) = send(&app, Method::POST, "/api/v1/jobs", Some(new_job("*/5 * * * *"))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["httpMethod"], "POST");
    assert_eq!(body["data"]["isActive"], true);
    assert_eq!(body["data"]["nextRun"], "2024-01-01T10:05:00Z");
}

#[tokio::test]
async fn test_create_rejects_bad_schedule() {
    let app = app();
    let (status, body) = send(&app, Method::POST, "/api/v1/jobs", Some(new_job("bad cron"))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "INVALID_SCHEDULE");

    let (_, list) = send(&app, Method::GET, "/api/v1/jobs", None).await;
    assert_eq!(list["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_get_and_list() {
    let app = app();
    let (_, created) = send(&app, Method::POST, "/api/v1/jobs", Some(new_job("0 9 * * *"))).await;
    send(&app, Method::POST, "/api/v1/jobs", Some(new_job("*/5 * * * *"))).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/jobs/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["schedule"], "0 9 * * *");
    assert_eq!(body["data"]["nextRun"], "2024-01-02T09:00:00Z");

    let (status, list) = send(&app, Method::GET, "/api/v1/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_get_unknown_is_not_found() {
    let app = app();
    let uri = format!("/api/v1/jobs/{}", uuid::Uuid::new_v4());
    let (status, body) = send(&app, Method::GET, &uri, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "JOB_NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_id_is_rejected() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/jobs/not-a-uuid", None).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_patch_updates_schedule() {
    let app = app();
    let (_, created) = send(&app, Method::POST, "/api/v1/jobs", Some(new_job("*/5 * * * *"))).await;
    let uri = format!("/api/v1/jobs/{}", created["data"]["id"].as_str().unwrap());

    let (status, body) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(json!({ "schedule": "0 9 * * *", "isActive": false })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["schedule"], "0 9 * * *");
    assert_eq!(body["data"]["isActive"], false);
    assert_eq!(body["data"]["uri"], "http://x/hook");
}

#[tokio::test]
async fn test_patch_body_null_clears_and_absent_keeps() {
    let app = app();
    let (_, created) = send(&app, Method::POST, "/api/v1/jobs", Some(new_job("*/5 * * * *"))).await;
    let uri = format!("/api/v1/jobs/{}", created["data"]["id"].as_str().unwrap());

    let (status, body) = send(&app, Method::PATCH, &uri, Some(json!({ "isActive": false }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["body"], "{\"ping\":true}");

    let (status, body) = send(&app, Method::PATCH, &uri, Some(json!({ "body": null }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].get("body").is_none());
    assert_eq!(body["data"]["isActive"], false);
}

#[tokio::test]
async fn test_patch_unknown_is_not_found() {
    let app = app();
    let uri = format!("/api/v1/jobs/{}", uuid::Uuid::new_v4());
    let (status, _) = send(&app, Method::PATCH, &uri, Some(json!({ "body": "x" }))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_then_not_found() {
    let app = app();
    let (_, created) = send(&app, Method::POST, "/api/v1/jobs", Some(new_job("*/5 * * * *"))).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/jobs/{}", id);

    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], true);
    assert_eq!(body["data"]["id"], id.as_str());

    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Metrics
// ============================================================================

#[tokio::test]
async fn test_metrics_disabled_is_not_found() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/metrics", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error_code"], "MetricsDisabled");
}
