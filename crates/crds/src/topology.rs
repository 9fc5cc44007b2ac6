//! Multi-cluster topology CRDs
//!
//! A cluster is either a hub (`ManagementCluster`), a spoke
//! (`ManagementClusterConnection`) or standalone. Declaring both is a
//! configuration error.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "operator.tigera.io",
    version = "v1",
    kind = "ManagementCluster"
)]
#[serde(rename_all = "camelCase")]
pub struct ManagementClusterSpec {
    /// Address spokes use to reach the hub tunnel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "operator.tigera.io",
    version = "v1",
    kind = "ManagementClusterConnection"
)]
#[serde(rename_all = "camelCase")]
pub struct ManagementClusterConnectionSpec {
    /// Address of the hub this spoke connects to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_cluster_addr: Option<String>,
}
