//! Hookcron CLI - command-line interface for a hookcron server.
//!
//! Provides job, status, health, and configuration commands.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config, health, jobs};
use output::OutputFormat;

const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Hookcron - scheduled webhook dispatcher CLI
#[derive(Parser)]
#[command(
    name = "hookcron",
    version,
    about = "Hookcron - scheduled webhook dispatcher",
    long_about = "CLI tool for creating, inspecting and removing scheduled webhook jobs.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// API server URL
    #[arg(long, global = true, env = "HOOKCRON_API_URL")]
    api_url: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Job management operations
    #[command(subcommand)]
    Jobs(jobs::JobCommands),

    /// Show the service status snapshot
    Status,

    /// Check server health
    Health(health::HealthArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let api_url = cli
        .api_url
        .clone()
        .or_else(config::load_api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let client = client::ApiClient::new(&api_url)?;
    let format = cli.output;

    let result = match cli.command {
        Commands::Jobs(cmd) => jobs::execute(cmd, &client, format).await,
        Commands::Status => health::status(&client, format).await,
        Commands::Health(args) => health::execute(args, &client, format).await,
        Commands::Config(cmd) => config::execute(cmd, format).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
