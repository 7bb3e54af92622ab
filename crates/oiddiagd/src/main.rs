//! oiddiagd - OpenID handshake diagnostician
//!
//! Serves the diagnostic harness over HTTP, or runs a single diagnosis from
//! the command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oiddiag_shared::render::render_timeline;
use oiddiagd::catalog;
use oiddiagd::config::{Config, NegotiatorMode};
use oiddiagd::diagnostician::Diagnostician;
use oiddiagd::negotiator::{FakeNegotiator, HttpNegotiator, Negotiator};
use oiddiagd::server::{self, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "oiddiagd", version, about = "OpenID handshake diagnostician")]
struct Cli {
    /// Config file (defaults to /etc/oiddiag/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the canned negotiator instead of talking to real peers
    #[arg(long, global = true)]
    mock: bool,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the harness over HTTP (default)
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run one diagnosis and print its timeline
    Diagnose { identifier: String },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_negotiator(config: &Config, mock: bool) -> Result<Arc<dyn Negotiator>> {
    if mock || config.negotiator.mode == NegotiatorMode::Mock {
        warn!("Using mock negotiator - no peer will be contacted");
        return Ok(Arc::new(FakeNegotiator::new()));
    }
    let negotiator = HttpNegotiator::new(&config.negotiator).context("Failed to build HTTP negotiator")?;
    Ok(Arc::new(negotiator))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    info!("oiddiagd v{} starting", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load(),
    };

    let negotiator = build_negotiator(&config, cli.mock)?;
    let diagnostician = Arc::new(Diagnostician::from_config(negotiator, &config.diagnostic));

    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            let router = catalog::standard_router(diagnostician, &config.diagnostic);
            info!("  {} tests registered", router.count());
            let bind_addr = bind.unwrap_or_else(|| config.server.bind_addr.clone());
            server::run(AppState::new(router), &bind_addr).await
        }
        Command::Diagnose { identifier } => {
            let run = diagnostician.run(&identifier).await;
            print!("{}", render_timeline(&identifier, run.events()));
            println!("Result: {}", run.state());
            if !run.succeeded() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
