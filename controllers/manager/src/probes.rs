//! Health, readiness and metrics endpoints.

use crate::error::ControllerError;
use crate::readiness::ReadyFlag;
use crate::reconciler::status::ReconcileStatus;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Reconcile metrics
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    /// Passes by outcome
    pub reconcile_total: IntCounterVec,
    /// 1 while the Manager is degraded
    pub degraded: IntGauge,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").field("degraded", &self.degraded.get()).finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create and register the reconcile metrics
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();
        let probe_err = |e: prometheus::Error| ControllerError::Probe(e.to_string());

        let reconcile_total = IntCounterVec::new(
            Opts::new("manager_reconcile_total", "Manager reconcile passes by outcome"),
            &["outcome"],
        )
        .map_err(probe_err)?;
        registry
            .register(Box::new(reconcile_total.clone()))
            .map_err(probe_err)?;

        let degraded = IntGauge::new("manager_degraded", "Whether the Manager is degraded").map_err(probe_err)?;
        registry.register(Box::new(degraded.clone())).map_err(probe_err)?;

        Ok(Self {
            registry,
            reconcile_total,
            degraded,
        })
    }

    /// Records the result of one pass.
    pub fn observe(&self, result: Result<&ReconcileStatus, &ControllerError>) {
        let outcome = match result {
            Ok(status) => status.as_str(),
            Err(_) => "error",
        };
        self.reconcile_total.with_label_values(&[outcome]).inc();

        match result {
            Ok(ReconcileStatus::Degraded { .. }) | Err(_) => self.degraded.set(1),
            Ok(ReconcileStatus::Ready | ReconcileStatus::Progressing) => self.degraded.set(0),
            Ok(ReconcileStatus::Unknown | ReconcileStatus::CRNotFound) => {}
        }
    }

    /// Prometheus text exposition of every registered metric.
    pub fn encode(&self) -> Result<String, ControllerError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| ControllerError::Probe(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| ControllerError::Probe(e.to_string()))
    }
}

#[derive(Debug, Clone)]
struct ProbeState {
    ready: ReadyFlag,
    metrics: Metrics,
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(state): State<ProbeState>) -> impl IntoResponse {
    if state.ready.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "waiting for LicenseKey API")
    }
}

async fn render_metrics(State(state): State<ProbeState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body),
        Err(e) => {
            warn!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                e.to_string(),
            )
        }
    }
}

/// Routes served by the probe server.
pub fn router(ready: ReadyFlag, metrics: Metrics) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(render_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(ProbeState { ready, metrics })
}

/// Serves the probe endpoints on `addr` until `cancel` fires.
pub async fn serve(
    addr: SocketAddr,
    ready: ReadyFlag,
    metrics: Metrics,
    cancel: CancellationToken,
) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ControllerError::Probe(format!("failed to bind {addr}: {e}")))?;
    info!(%addr, "Serving probes and metrics");

    axum::serve(listener, router(ready, metrics))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| ControllerError::Probe(e.to_string()))
}
