//! oiddiagctl - CLI client for oiddiagd
//!
//! Talks to a running daemon over its HTTP API.

mod client;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client::{DaemonClient, DEFAULT_DAEMON_URL};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "oiddiagctl")]
#[command(about = "Drive the OpenID handshake diagnostician", long_about = None)]
#[command(version)]
struct Cli {
    /// Daemon base URL
    #[arg(long, global = true, default_value = DEFAULT_DAEMON_URL)]
    daemon_url: String,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = 60)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon health
    Status,

    /// Run one handshake against an identifier
    Diagnose { identifier: String },

    /// List registered tests and their attempt counts
    Tests,

    /// Retry a test and print its updated history
    Try {
        test: String,

        /// Identifier to test (falls back to the daemon's default)
        #[arg(long)]
        identifier: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = DaemonClient::new(&cli.daemon_url, Duration::from_secs(cli.timeout))?;

    match cli.command {
        Commands::Status => commands::status(&client).await,
        Commands::Diagnose { identifier } => commands::diagnose(&client, &identifier).await,
        Commands::Tests => commands::tests(&client).await,
        Commands::Try { test, identifier } => {
            commands::try_test(&client, &test, identifier.as_deref()).await
        }
    }
}
