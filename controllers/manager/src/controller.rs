//! Main controller implementation.
//!
//! Wires the cluster store, the license API bootstrap, the Manager watcher
//! and the probe server together and runs them until one exits.

use crate::backoff::BackoffTracker;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::probes::{self, Metrics};
use crate::readiness::{self, ReadyFlag, LICENSE_API_POLL_INTERVAL};
use crate::reconciler::Reconciler;
use crate::render::ManagerRenderer;
use crate::watcher::{self, Context};
use cluster_client::{ClusterStore, KubeClusterStore};
use kube::Client;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Main controller for the Manager resource.
#[derive(Debug)]
pub struct Controller {
    manager_watcher: JoinHandle<Result<(), ControllerError>>,
    probe_server: JoinHandle<Result<(), ControllerError>>,
    license_bootstrap: JoinHandle<()>,
    cancel: CancellationToken,
}

impl Controller {
    /// Creates a new controller instance and starts its tasks.
    pub async fn new(config: ControllerConfig, cancel: CancellationToken) -> Result<Self, ControllerError> {
        info!("Initializing Manager Controller");

        let client = Client::try_default()
            .await
            .map_err(|e| ControllerError::Store(e.into()))?;
        let store: Arc<dyn ClusterStore> = Arc::new(KubeClusterStore::new(client.clone()));

        let ready = ReadyFlag::new();
        let metrics = Metrics::new()?;
        let reconciler = Reconciler::new(
            Arc::clone(&store),
            Arc::new(ManagerRenderer),
            config.clone(),
            ready.clone(),
        );

        let license_bootstrap = tokio::spawn(readiness::wait_for_license_api(
            store,
            ready.clone(),
            LICENSE_API_POLL_INTERVAL,
            cancel.clone(),
        ));

        let probe_server = tokio::spawn(probes::serve(
            config.probe_addr,
            ready,
            metrics.clone(),
            cancel.clone(),
        ));

        let ctx = Arc::new(Context {
            reconciler: Arc::new(reconciler),
            backoff: BackoffTracker::new(),
            metrics,
            cancel: cancel.clone(),
        });
        let manager_watcher = tokio::spawn(watcher::watch_managers(
            client,
            config.operator_namespace.clone(),
            ctx,
        ));

        Ok(Self {
            manager_watcher,
            probe_server,
            license_bootstrap,
            cancel,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Manager Controller running");

        let result = tokio::select! {
            result = &mut self.manager_watcher => {
                result
                    .map_err(|e| ControllerError::Watch(format!("Manager watcher panicked: {e}")))
                    .and_then(|r| r)
            }
            result = &mut self.probe_server => {
                result
                    .map_err(|e| ControllerError::Probe(format!("Probe server panicked: {e}")))
                    .and_then(|r| r)
            }
        };

        // Whichever task finished first, stop the rest
        self.cancel.cancel();
        self.license_bootstrap.abort();
        result
    }
}
