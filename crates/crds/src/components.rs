//! Peer component CRDs
//!
//! `APIServer` and `Compliance` are reconciled by sibling controllers; the
//! Manager controller only reads their reported state.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "operator.tigera.io",
    version = "v1",
    kind = "APIServer",
    status = "ComponentStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct APIServerSpec {}

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "operator.tigera.io",
    version = "v1",
    kind = "Compliance",
    status = "ComponentStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceSpec {}

/// Status shared by peer components
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    /// Reported state, `Ready` once converged
    #[serde(default)]
    pub state: String,
}

/// Reported state of an optional status block, empty when absent.
pub fn reported_state(status: Option<&ComponentStatus>) -> &str {
    status.map_or("", |s| s.state.as_str())
}

impl APIServer {
    /// Whether the API server reports `Ready`.
    pub fn is_ready(&self) -> bool {
        reported_state(self.status.as_ref()) == crate::STATE_READY
    }
}

impl Compliance {
    /// Whether compliance reports `Ready`.
    pub fn is_ready(&self) -> bool {
        reported_state(self.status.as_ref()) == crate::STATE_READY
    }
}
