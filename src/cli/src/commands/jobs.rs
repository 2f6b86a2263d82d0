//! Job management commands.
//!
//! Provides list, get, create, update, and delete operations for jobs.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::{Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tabled::Tabled;
use uuid::Uuid;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

const JOBS_PATH: &str = "/api/v1/jobs";

#[derive(Subcommand)]
pub enum JobCommands {
    /// List all jobs
    List,

    /// Show one job
    Get {
        /// Job ID
        job_id: Uuid,
    },

    /// Create a scheduled webhook job
    Create {
        /// Webhook URI to call
        #[arg(short, long)]
        uri: String,

        /// Five-field cron expression
        #[arg(short, long)]
        schedule: String,

        /// HTTP method
        #[arg(short, long, value_enum, default_value = "post")]
        method: Method,

        /// Request body sent with each call
        #[arg(short, long)]
        body: Option<String>,

        /// IANA time zone (server default when omitted)
        #[arg(short = 'z', long)]
        time_zone: Option<String>,
    },

    /// Update fields of a job
    Update {
        /// Job ID
        job_id: Uuid,

        #[arg(short, long)]
        uri: Option<String>,

        #[arg(short, long)]
        schedule: Option<String>,

        #[arg(short, long, value_enum)]
        method: Option<Method>,

        #[arg(short, long, conflicts_with = "clear_body")]
        body: Option<String>,

        /// Remove the request body
        #[arg(long)]
        clear_body: bool,

        #[arg(short = 'z', long)]
        time_zone: Option<String>,

        /// Resume firing
        #[arg(long, conflicts_with = "deactivate")]
        activate: bool,

        /// Stop firing without deleting
        #[arg(long)]
        deactivate: bool,
    },

    /// Delete a job
    Delete {
        /// Job ID
        job_id: Uuid,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

// ── API types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateJobBody {
    uri: String,
    http_method: Method,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    schedule: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateJobBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    http_method: Option<Method>,
    /// `Some(None)` is sent as `null`, which clears the body.
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schedule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_active: Option<bool>,
}

impl UpdateJobBody {
    fn is_empty(&self) -> bool {
        self.uri.is_none()
            && self.http_method.is_none()
            && self.body.is_none()
            && self.schedule.is_none()
            && self.time_zone.is_none()
            && self.is_active.is_none()
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct JobInfo {
    id: Uuid,
    uri: String,
    http_method: Method,
    #[serde(default)]
    body: Option<String>,
    schedule: String,
    time_zone: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    next_run: Option<DateTime<Utc>>,
}

#[derive(Debug, Tabled)]
struct JobRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "URI")]
    uri: String,
    #[tabled(rename = "Schedule")]
    schedule: String,
    #[tabled(rename = "Zone")]
    time_zone: String,
    #[tabled(rename = "Active")]
    active: String,
    #[tabled(rename = "Next Run")]
    next_run: String,
}

impl From<&JobInfo> for JobRow {
    fn from(job: &JobInfo) -> Self {
        Self {
            id: job.id.to_string()[..8].to_string(),
            method: format!("{:?}", job.http_method).to_uppercase(),
            uri: job.uri.clone(),
            schedule: job.schedule.clone(),
            time_zone: job.time_zone.clone(),
            active: if job.is_active { "yes" } else { "no" }.to_string(),
            next_run: format_time(job.next_run),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct DeleteResponse {
    id: Uuid,
    deleted: bool,
}

fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn print_job(job: &JobInfo, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            output::print_header(&format!("Job: {}", job.id));
            output::print_detail("URI", &job.uri);
            output::print_detail("Method", &format!("{:?}", job.http_method).to_uppercase());
            output::print_detail("Schedule", &job.schedule);
            output::print_detail("Time Zone", &job.time_zone);
            output::print_detail("Active", &job.is_active.to_string());
            if let Some(body) = &job.body {
                output::print_detail("Body", body);
            }
            output::print_detail("Last Run", &format_time(job.last_run));
            output::print_detail("Next Run", &format_time(job.next_run));
            output::print_detail("Updated", &job.updated_at.to_rfc3339());
            Ok(())
        }
        _ => output::print_item(job, format),
    }
}

// ── Execution ───────────────────────────────────────────────────────────────

pub async fn execute(cmd: JobCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        JobCommands::List => {
            let jobs: Vec<JobInfo> = client.get(JOBS_PATH).await?;
            let rows: Vec<JobRow> = jobs.iter().map(JobRow::from).collect();
            output::print_list(&jobs, rows, format)?;
        }

        JobCommands::Get { job_id } => {
            let job: JobInfo = client.get(&format!("{}/{}", JOBS_PATH, job_id)).await?;
            print_job(&job, format)?;
        }

        JobCommands::Create {
            uri,
            schedule,
            method,
            body,
            time_zone,
        } => {
            let request = CreateJobBody {
                uri,
                http_method: method,
                body,
                schedule,
                time_zone,
            };
            let job: JobInfo = client.post(JOBS_PATH, &request).await?;

            if let OutputFormat::Table = format {
                output::print_success("Job created");
            }
            print_job(&job, format)?;
        }

        JobCommands::Update {
            job_id,
            uri,
            schedule,
            method,
            body,
            clear_body,
            time_zone,
            activate,
            deactivate,
        } => {
            let request = UpdateJobBody {
                uri,
                http_method: method,
                body: if clear_body { Some(None) } else { body.map(Some) },
                schedule,
                time_zone,
                is_active: match (activate, deactivate) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
            };
            if request.is_empty() {
                bail!("Nothing to update; pass at least one field");
            }

            let job: JobInfo = client
                .patch(&format!("{}/{}", JOBS_PATH, job_id), &request)
                .await?;

            if let OutputFormat::Table = format {
                output::print_success("Job updated");
            }
            print_job(&job, format)?;
        }

        JobCommands::Delete { job_id } => {
            let resp: DeleteResponse = client.delete(&format!("{}/{}", JOBS_PATH, job_id)).await?;

            match format {
                OutputFormat::Table => output::print_success(&format!("Job {} deleted", resp.id)),
                _ => output::print_item(&resp, format)?,
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_body_wire_format() {
        let body = CreateJobBody {
            uri: "http://x/hook".into(),
            http_method: Method::Post,
            body: None,
            schedule: "*/5 * * * *".into(),
            time_zone: Some("UTC".into()),
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["httpMethod"], "POST");
        assert_eq!(json["timeZone"], "UTC");
        assert!(json.get("body").is_none());
    }

    #[test]
    fn test_update_body_omits_unset_fields() {
        let body = UpdateJobBody {
            is_active: Some(false),
            ..Default::default()
        };
        assert!(!body.is_empty());
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "isActive": false })
        );
        assert!(UpdateJobBody::default().is_empty());
    }

    #[test]
    fn test_update_body_sends_null_to_clear() {
        let body = UpdateJobBody {
            body: Some(None),
            ..Default::default()
        };
        assert!(!body.is_empty());
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "body": null })
        );
    }

    #[test]
    fn test_job_row_from_info() {
        let job: JobInfo = serde_json::from_value(serde_json::json!({
            "id": "6f1c1c1e-1b7a-4a51-9a53-0d5b6c2f9a10",
            "uri": "http://x/hook",
            "httpMethod": "GET",
            "schedule": "0 9 * * *",
            "timeZone": "Europe/Berlin",
            "isActive": true,
            "createdAt": "2024-01-01T10:00:00Z",
            "updatedAt": "2024-01-01T10:00:00Z",
            "nextRun": "2024-01-02T08:00:00Z"
        }))
        .unwrap();

        let row = JobRow::from(&job);
        assert_eq!(row.id, "6f1c1c1e");
        assert_eq!(row.method, "GET");
        assert_eq!(row.active, "yes");
        assert_eq!(row.next_run, "2024-01-02 08:00:00 UTC");
    }
}
