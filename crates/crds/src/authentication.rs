//! Authentication CRD
//!
//! Optional resource configuring how users of the Manager UI authenticate.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "operator.tigera.io",
    version = "v1",
    kind = "Authentication",
    status = "AuthenticationStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationSpec {
    /// Public URL of the Manager UI (must be https)
    pub manager_domain: String,

    /// OIDC provider settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc: Option<AuthenticationOidc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOidc {
    /// Issuer URL of the identity provider
    #[serde(rename = "issuerURL")]
    pub issuer_url: String,

    /// Claim carrying the username
    #[serde(default = "default_username_claim")]
    pub username_claim: String,

    /// Claim carrying group membership
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups_claim: Option<String>,

    /// Prefix applied to usernames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_prefix: Option<String>,

    /// Prefix applied to groups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups_prefix: Option<String>,

    /// Whether tokens are brokered through Dex or validated directly
    #[serde(default, rename = "type")]
    pub oidc_type: OidcType,
}

fn default_username_claim() -> String {
    "email".to_string()
}

/// How OIDC tokens reach the Manager
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum OidcType {
    /// Tokens are issued by the bundled Dex broker
    #[default]
    Dex,

    /// Tokens are validated directly against the provider
    Tigera,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationStatus {
    /// Reported state, `Ready` once converged
    #[serde(default)]
    pub state: String,
}

impl Authentication {
    /// Whether the authentication controller reports `Ready`.
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.state == crate::STATE_READY)
    }

    /// Reported state, empty when no status was written yet.
    pub fn state(&self) -> &str {
        self.status.as_ref().map_or("", |s| s.state.as_str())
    }
}
