//! Manager CRD
//!
//! The primary resource reconciled by the controller. A single cluster-scoped
//! instance named `tigera-secure` is supported.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Auth type accepted on the Manager resource. Every other mode moved to the
/// `Authentication` resource.
pub const SUPPORTED_AUTH_TYPE: &str = "Token";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "operator.tigera.io",
    version = "v1",
    kind = "Manager",
    status = "ManagerStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ManagerSpec {
    /// Legacy authentication settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<ManagerAuth>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManagerAuth {
    /// Authentication mode (only `Token` is accepted)
    #[serde(rename = "type")]
    pub auth_type: String,
}

impl Manager {
    /// Returns the configured auth type when it is not the supported one.
    pub fn unsupported_auth_type(&self) -> Option<&str> {
        self.spec
            .auth
            .as_ref()
            .map(|auth| auth.auth_type.as_str())
            .filter(|auth_type| *auth_type != SUPPORTED_AUTH_TYPE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManagerStatus {
    /// Overall state (`Ready` once converged and available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Conditions describing the most recent reconciliation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<StatusCondition>,
}

impl ManagerStatus {
    /// Finds a condition by type.
    pub fn condition(&self, condition_type: &str) -> Option<&StatusCondition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }
}

/// A single status condition.
///
/// Equality ignores `last_transition_time` so that status writes can be
/// skipped when nothing but the timestamp would change.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusCondition {
    /// Condition type (e.g. `Degraded`)
    #[serde(rename = "type")]
    pub condition_type: String,

    /// `True`, `False` or `Unknown`
    pub status: String,

    /// Short machine-oriented reason
    #[serde(default)]
    pub reason: String,

    /// Human readable message
    #[serde(default)]
    pub message: String,

    /// When the condition last changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<chrono::DateTime<chrono::Utc>>,
}

impl PartialEq for StatusCondition {
    fn eq(&self, other: &Self) -> bool {
        self.condition_type == other.condition_type
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}
