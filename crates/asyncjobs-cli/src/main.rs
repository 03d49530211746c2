//! asyncjobs CLI tool.

use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "asyncjobs")]
#[command(about = "asyncjobs job-processing CLI", long_about = None)]
struct Cli {
    /// API server URL
    #[arg(long, env = "ASYNCJOBS_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a job to the API server
    Submit {
        /// How long the job works for
        #[arg(long)]
        seconds: u64,
        /// Poll until the job completes
        #[arg(short, long)]
        wait: bool,
        /// Seconds between status polls
        #[arg(long, default_value = "2")]
        interval: u64,
    },
    /// Show the status of a job
    Status {
        /// Job ID
        id: String,
    },
    /// Run one job in-process against an in-memory store
    Run {
        /// How long the job works for
        #[arg(long)]
        seconds: u64,
        /// Largest permitted seconds value
        #[arg(long, env = "TIMEOUT", default_value = "300")]
        timeout: u64,
    },
    /// Validate a server configuration file
    Validate {
        /// Path to the configuration file
        #[arg(default_value = "asyncjobs.kdl")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Submit {
            seconds,
            wait,
            interval,
        } => {
            let poll = wait.then(|| Duration::from_secs(interval.max(1)));
            commands::jobs::submit(&cli.api_url, seconds, poll).await?;
        }
        Commands::Status { id } => {
            commands::jobs::status(&cli.api_url, &id).await?;
        }
        Commands::Run { seconds, timeout } => {
            commands::run::run_local(seconds, timeout).await?;
        }
        Commands::Validate { path } => {
            commands::validate(&path)?;
        }
    }

    Ok(())
}
