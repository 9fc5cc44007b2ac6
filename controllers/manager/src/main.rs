//! Manager Controller
//!
//! Converges the Manager web console onto the cluster. Each pass checks an
//! ordered list of dependencies, settles the serving certificate, renders
//! the Manager objects and applies them idempotently, then reports the
//! result on the `Manager` status.

mod backoff;
mod config;
mod controller;
mod error;
mod names;
mod pki;
mod probes;
mod readiness;
mod reconciler;
mod render;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use controller::Controller;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // rustls needs a process-wide crypto provider before the kube client is built
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting Manager Controller");

    let config = ControllerConfig::from_env()?;
    config.log_summary();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown signal received");
                    cancel.cancel();
                }
                Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
            }
        });
    }

    let controller = Controller::new(config, cancel).await?;
    controller.run().await?;

    info!("Manager Controller stopped");
    Ok(())
}
