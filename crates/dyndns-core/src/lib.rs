//! dyndns-core – configuration, validation and the DynDNS2 endpoint

pub mod auth;
pub mod cfg;
pub mod error;
pub mod http;
pub mod password;
pub mod response;
pub mod retry;
pub mod updater;
pub mod validate;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use dyndns_provider::ZoneClient;
use std::sync::Arc;
use tracing::info;

pub use cfg::Config;
pub use password::PasswordHash;
pub use response::DynDnsResponse;
pub use updater::{DnsUpdater, UpdateOutcome};

/// Verifies the managed zone, then serves until SIGINT / SIGTERM.
pub async fn bootstrap(cfg: Config, client: Arc<dyn ZoneClient>) -> Result<()> {
    let config = Arc::new(cfg);
    let updater = Arc::new(DnsUpdater::new(config.clone(), client));

    updater
        .ensure_zone()
        .await
        .with_context(|| format!("cannot use managed zone `{}`", config.zone))?;

    let state = http::AppState { config, updater };
    http::run_http_server(state, shutdown_signal()).await?;
    info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("cannot listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received, draining connections");
}
