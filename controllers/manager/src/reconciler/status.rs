//! Status aggregation for the `Manager` resource.
//!
//! Writes are best effort: a failed status patch is logged and never fails
//! the pass. A patch is skipped when the persisted status already matches.

use chrono::{DateTime, Utc};
use cluster_client::ClusterStore;
use crds::{Manager, ManagerStatus, StatusCondition, STATE_READY};
use tracing::{debug, warn};

/// Condition type carrying the last failure.
pub const DEGRADED_CONDITION: &str = "Degraded";

/// State written while a gate or apply failure is outstanding.
pub const STATE_DEGRADED: &str = "Degraded";

/// Outcome of one reconcile pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileStatus {
    /// The pass did not get far enough to decide
    Unknown,
    /// The primary resource does not exist
    CRNotFound,
    /// A gate or apply step short-circuited the pass
    Degraded { reason: String, message: String },
    /// Everything applied but workloads are still rolling out
    Progressing,
    /// Applied and available
    Ready,
}

impl ReconcileStatus {
    /// Label used for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileStatus::Unknown => "unknown",
            ReconcileStatus::CRNotFound => "not_found",
            ReconcileStatus::Degraded { .. } => "degraded",
            ReconcileStatus::Progressing => "progressing",
            ReconcileStatus::Ready => "ready",
        }
    }
}

fn degraded_condition(
    current: Option<&ManagerStatus>,
    status: &str,
    reason: &str,
    message: &str,
    now: DateTime<Utc>,
) -> StatusCondition {
    let desired = StatusCondition {
        condition_type: DEGRADED_CONDITION.to_string(),
        status: status.to_string(),
        reason: reason.to_string(),
        message: message.to_string(),
        last_transition_time: Some(now),
    };
    match current.and_then(|s| s.condition(DEGRADED_CONDITION)) {
        Some(existing) if existing.status == desired.status => StatusCondition {
            last_transition_time: existing.last_transition_time.or(Some(now)),
            ..desired
        },
        _ => desired,
    }
}

fn with_condition(current: Option<&ManagerStatus>, state: Option<&str>, condition: StatusCondition) -> ManagerStatus {
    let mut conditions: Vec<StatusCondition> = current
        .map(|s| {
            s.conditions
                .iter()
                .filter(|c| c.condition_type != condition.condition_type)
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    conditions.push(condition);
    conditions.sort_by(|a, b| a.condition_type.cmp(&b.condition_type));
    ManagerStatus {
        state: state.map(str::to_string),
        conditions,
    }
}

/// Status recording a failure.
pub fn degraded_status(
    current: Option<&ManagerStatus>,
    reason: &str,
    message: &str,
    now: DateTime<Utc>,
) -> ManagerStatus {
    let condition = degraded_condition(current, "True", reason, message, now);
    with_condition(current, Some(STATE_DEGRADED), condition)
}

/// Status recording a converged, available Manager.
pub fn ready_status(current: Option<&ManagerStatus>, now: DateTime<Utc>) -> ManagerStatus {
    let condition = degraded_condition(current, "False", "", "", now);
    with_condition(current, Some(STATE_READY), condition)
}

/// Status for a pass that applied everything while workloads still roll
/// out. A previous failure is cleared; `None` when nothing is outstanding.
pub fn progressing_status(current: Option<&ManagerStatus>, now: DateTime<Utc>) -> Option<ManagerStatus> {
    let current = current?;
    if current.condition(DEGRADED_CONDITION).is_none_or(|c| c.status != "True") {
        return None;
    }
    let state = current.state.as_deref().filter(|s| *s != STATE_DEGRADED);
    let condition = degraded_condition(Some(current), "False", "", "", now);
    Some(with_condition(Some(current), state, condition))
}

/// Whether `desired` differs from what is persisted. Condition timestamps
/// are ignored.
pub fn status_needs_update(current: Option<&ManagerStatus>, desired: &ManagerStatus) -> bool {
    current != Some(desired)
}

/// Persists pass outcomes onto the `Manager` status.
pub struct StatusAggregator<'a> {
    store: &'a dyn ClusterStore,
    now: DateTime<Utc>,
}

impl std::fmt::Debug for StatusAggregator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusAggregator").field("now", &self.now).finish_non_exhaustive()
    }
}

impl<'a> StatusAggregator<'a> {
    pub fn new(store: &'a dyn ClusterStore, now: DateTime<Utc>) -> Self {
        Self { store, now }
    }

    /// Records `status` on `manager`. `Progressing` only clears an
    /// outstanding failure; `Unknown` and `CRNotFound` are never persisted.
    pub async fn record(&self, manager: &Manager, status: &ReconcileStatus) {
        let current = manager.status.as_ref();
        let desired = match status {
            ReconcileStatus::Degraded { reason, message } => degraded_status(current, reason, message, self.now),
            ReconcileStatus::Ready => ready_status(current, self.now),
            ReconcileStatus::Progressing => match progressing_status(current, self.now) {
                Some(desired) => desired,
                None => return,
            },
            ReconcileStatus::Unknown | ReconcileStatus::CRNotFound => return,
        };

        if !status_needs_update(current, &desired) {
            debug!("Manager status unchanged, skipping update");
            return;
        }

        let name = manager.metadata.name.as_deref().unwrap_or(crds::DEFAULT_INSTANCE_NAME);
        if let Err(e) = self.store.patch_manager_status(name, &desired).await {
            warn!("Failed to update Manager status: {}", e);
        }
    }
}
