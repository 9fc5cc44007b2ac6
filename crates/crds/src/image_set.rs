//! ImageSet CRD
//!
//! Pins component images to digests for one product release.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "operator.tigera.io",
    version = "v1",
    kind = "ImageSet"
)]
#[serde(rename_all = "camelCase")]
pub struct ImageSetSpec {
    /// Image to digest mappings
    #[serde(default)]
    pub images: Vec<ImageDigest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageDigest {
    /// Image path without registry or tag (e.g. `tigera/cnx-manager`)
    pub image: String,

    /// Content digest (`sha256:...`)
    pub digest: String,
}
