//! Manager reconciliation.
//!
//! One pass resolves the dependency gates, settles the serving certificate,
//! assembles and renders the desired objects, applies them and records the
//! outcome on the `Manager` status.

pub mod apply;
pub mod assembler;
pub mod certificates;
pub mod dependencies;
pub mod gates;
pub mod image_set;
pub mod status;


use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::readiness::ReadyFlag;
use crate::render::Renderer;
use apply::{ApplyEngine, ApplyReport, Component, DesiredObjectSet};
use chrono::Utc;
use cluster_client::ClusterStore;
use crds::Manager;
use gates::{GateOutcome, GateResolver, Resolution};
use status::{ReconcileStatus, StatusAggregator};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Result of a pass that did not error.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub status: ReconcileStatus,
    /// Set when a gate asked to be retried after a fixed delay
    pub requeue_after: Option<Duration>,
    pub applied: Option<ApplyReport>,
    pub desired: Option<DesiredObjectSet>,
}

impl PassReport {
    fn new(status: ReconcileStatus) -> Self {
        Self {
            status,
            requeue_after: None,
            applied: None,
            desired: None,
        }
    }
}

/// Drives Manager reconciliation against a [`ClusterStore`].
pub struct Reconciler {
    store: Arc<dyn ClusterStore>,
    renderer: Arc<dyn Renderer>,
    config: ControllerConfig,
    license_api_ready: ReadyFlag,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("license_api_ready", &self.license_api_ready.is_ready())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ClusterStore>,
        renderer: Arc<dyn Renderer>,
        config: ControllerConfig,
        license_api_ready: ReadyFlag,
    ) -> Self {
        Self {
            store,
            renderer,
            config,
            license_api_ready,
        }
    }

    pub fn license_api_ready(&self) -> &ReadyFlag {
        &self.license_api_ready
    }

    /// Runs one pass for `key`.
    ///
    /// Waiting on a dependency is not an error: the pass reports a
    /// `Degraded` status and, for some gates, a requeue delay. Failures are
    /// recorded on the status and returned so the caller can back off.
    pub async fn reconcile(&self, key: &str, cancel: &CancellationToken) -> Result<PassReport, ControllerError> {
        self.reconcile_pass(cancel)
            .instrument(info_span!("reconcile", key))
            .await
    }

    async fn reconcile_pass(&self, cancel: &CancellationToken) -> Result<PassReport, ControllerError> {
        info!("Reconciling Manager");
        let now = Utc::now();
        let aggregator = StatusAggregator::new(self.store.as_ref(), now);

        let resolver = GateResolver::new(self.store.as_ref(), &self.config, &self.license_api_ready, now);
        let snapshot = match resolver.resolve(cancel).await {
            Resolution::Ready(snapshot) => snapshot,
            Resolution::Absent => {
                debug!("Manager resource not found");
                return Ok(PassReport::new(ReconcileStatus::CRNotFound));
            }
            Resolution::Cancelled => {
                info!("Reconcile cancelled");
                return Ok(PassReport::new(ReconcileStatus::Unknown));
            }
            Resolution::Halted { gate, outcome, manager } => {
                let manager = manager.as_deref();
                return match outcome {
                    GateOutcome::Wait {
                        reason,
                        message,
                        requeue_after,
                    } => {
                        info!(gate = gate.name(), %reason, "Waiting on dependency");
                        let status = self.degrade(&aggregator, manager, reason, message).await;
                        Ok(PassReport {
                            requeue_after,
                            ..PassReport::new(status)
                        })
                    }
                    GateOutcome::Fail { reason, message, error } => {
                        warn!(gate = gate.name(), %reason, "Dependency check failed: {}", error);
                        self.degrade(&aggregator, manager, reason, message).await;
                        Err(error)
                    }
                    GateOutcome::Pass | GateOutcome::Absent => Ok(PassReport::new(ReconcileStatus::Unknown)),
                };
            }
        };
        let manager = &snapshot.manager;

        let bundle = match certificates::resolve_bundle(&snapshot, &self.config, now) {
            Ok(bundle) => bundle,
            Err(e) => return self.fail(&aggregator, manager, certificates::failure_reason(&e), e.into()).await,
        };
        let passthrough = match bundle
            .as_ref()
            .map(|b| b.passthrough(&self.config.operator_namespace))
            .transpose()
        {
            Ok(passthrough) => passthrough.flatten(),
            Err(e) => return self.fail(&aggregator, manager, certificates::failure_reason(&e), e.into()).await,
        };

        let config = assembler::assemble(&snapshot, bundle, &self.config);

        let mut rendered = match self.renderer.render(&config) {
            Ok(rendered) => rendered,
            Err(e) => return self.fail(&aggregator, manager, "Error rendering Manager".to_string(), e).await,
        };

        let image_set_name = image_set::image_set_name(config.variant, &config.release);
        let pinned = match self.store.get_image_set(&image_set_name).await {
            Ok(Some(set)) => image_set::apply_image_set(&mut rendered, &set),
            Ok(None) => Ok(()),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = pinned {
            return self.fail(&aggregator, manager, "Error with images from ImageSet".to_string(), e).await;
        }

        let desired = DesiredObjectSet {
            components: passthrough
                .map(Component::Passthrough)
                .into_iter()
                .chain(std::iter::once(Component::Rendered(rendered)))
                .collect(),
        };

        if cancel.is_cancelled() {
            info!("Reconcile cancelled before apply");
            return Ok(PassReport::new(ReconcileStatus::Unknown));
        }

        let engine = ApplyEngine::new(self.store.as_ref()).owned_by(manager);
        let report = match engine.apply(&desired).await {
            Ok(report) => report,
            Err(e) => {
                return self
                    .fail(&aggregator, manager, "Error creating / updating resource".to_string(), e)
                    .await;
            }
        };

        let available = engine.workloads_available(&report).await.unwrap_or_else(|e| {
            warn!("Failed to check Manager availability: {}", e);
            false
        });
        let status = if available {
            ReconcileStatus::Ready
        } else {
            ReconcileStatus::Progressing
        };
        aggregator.record(manager, &status).await;
        info!(status = status.as_str(), "Reconcile complete");

        Ok(PassReport {
            status,
            requeue_after: None,
            applied: Some(report),
            desired: Some(desired),
        })
    }

    async fn degrade(
        &self,
        aggregator: &StatusAggregator<'_>,
        manager: Option<&Manager>,
        reason: String,
        message: String,
    ) -> ReconcileStatus {
        let status = ReconcileStatus::Degraded { reason, message };
        if let Some(manager) = manager {
            aggregator.record(manager, &status).await;
        }
        status
    }

    async fn fail(
        &self,
        aggregator: &StatusAggregator<'_>,
        manager: &Manager,
        reason: String,
        error: ControllerError,
    ) -> Result<PassReport, ControllerError> {
        warn!(%reason, "Reconcile failed: {}", error);
        self.degrade(aggregator, Some(manager), reason, error.to_string()).await;
        Err(error)
    }
}
