//! Health and status commands.
//!
//! Queries `/health` and `/status` and displays the service snapshot.

use anyhow::Result;
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct HealthArgs {
    /// Include the job counters
    #[arg(short, long)]
    detailed: bool,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusInfo {
    initialized: bool,
    cluster_mode: bool,
    active_local_task_count: usize,
    total_job_count: usize,
    mode: String,
    uptime_secs: i64,
}

fn field<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    value.get(key).filter(|v| !v.is_null())
}

pub async fn execute(args: HealthArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: serde_json::Value = client.get_raw("/health").await?;

    match format {
        OutputFormat::Table => {
            let status = health
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");

            output::print_header("Server Health");
            output::print_detail("Status", status);
            output::print_detail("API URL", client.base_url());

            if let Some(version) = health.get("version").and_then(|v| v.as_str()) {
                output::print_detail("Version", version);
            }

            if let Some(ts) = health.get("timestamp").and_then(|v| v.as_str()) {
                output::print_detail("Timestamp", ts);
            }

            if args.detailed {
                for (label, key) in [
                    ("Cluster Mode", "clusterMode"),
                    ("Jobs", "totalJobCount"),
                    ("Local Timers", "activeLocalTaskCount"),
                ] {
                    if let Some(value) = field(&health, key) {
                        output::print_detail(label, &value.to_string());
                    }
                }
            }

            if status == "ok" {
                output::print_success("Server operational");
            } else {
                output::print_error(&format!("Server status: {}", status));
            }
        }
        _ => output::print_item(&health, format)?,
    }

    Ok(())
}

pub async fn status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: StatusInfo = client.get("/status").await?;

    match format {
        OutputFormat::Table => {
            output::print_header("Service Status");
            output::print_detail("Initialized", &status.initialized.to_string());
            output::print_detail("Mode", &status.mode);
            output::print_detail("Cluster Mode", &status.cluster_mode.to_string());
            output::print_detail("Jobs", &status.total_job_count.to_string());
            output::print_detail("Local Timers", &status.active_local_task_count.to_string());
            output::print_detail("Uptime", &format!("{}s", status.uptime_secs));
        }
        _ => output::print_item(&status, format)?,
    }

    Ok(())
}
