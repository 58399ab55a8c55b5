//! Command-line entry point for **dyndns**
//!
//! * `serve` (default) loads the environment config and runs the endpoint
//! * `hash-password` prints a hash suitable for `DYNDNS_PASSWORD`
//! * Sets up tracing with a compact formatter

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dyndns_core::{Config, PasswordHash, bootstrap, password::DEFAULT_ITERATIONS};
use dyndns_provider_clouddns::{CloudDnsClient, TokenSource};
use std::{io::Write, sync::Arc, time::Duration};
use tracing::{error, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Per-request timeout towards the Cloud DNS API.
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// CLI options
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the DynDNS2 endpoint (configuration comes from the environment)
    Serve {
        /// Pre-issued OAuth2 access token; the metadata server is used if absent
        #[arg(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true)]
        access_token: Option<String>,
    },
    /// Print a PBKDF2-SHA256 hash for DYNDNS_PASSWORD
    HashPassword {
        password: String,
        #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
        iterations: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,axum::rejection=warn")),
        )
        .with(fmt::layer().compact())
        .init();

    match cli.command.unwrap_or(Command::Serve { access_token: None }) {
        Command::HashPassword {
            password,
            iterations,
        } => {
            let hash = PasswordHash::generate(&password, iterations);
            writeln!(std::io::stdout(), "{hash}")?;
            Ok(())
        }
        Command::Serve { access_token } => serve(access_token).await,
    }
}

async fn serve(access_token: Option<String>) -> Result<()> {
    let cfg = Config::load().inspect_err(|e| error!("refusing to start: {e}"))?;
    info!(
        hostname = %cfg.hostname,
        zone = %cfg.zone,
        project = %cfg.project_id,
        "configuration loaded"
    );

    let tokens = access_token
        .or_else(|| std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN").ok())
        .filter(|t| !t.is_empty())
        .map(TokenSource::Static)
        .unwrap_or_default();
    let client = CloudDnsClient::new(&cfg.project_id, &cfg.zone, tokens, API_TIMEOUT)
        .context("building Cloud DNS client")?;

    bootstrap(cfg, Arc::new(client)).await
}
