//! Installation CRD
//!
//! The foundational installation resource. The Manager controller reads the
//! registry settings, pull secrets, replica count and certificate
//! management configuration from it.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "operator.tigera.io",
    version = "v1",
    kind = "Installation",
    status = "InstallationStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct InstallationSpec {
    /// Product variant to install
    #[serde(default)]
    pub variant: ProductVariant,

    /// Registry prefix for component images (e.g. `quay.io/`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,

    /// Path inserted between the registry and the image name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,

    /// Pull secrets, looked up in the operator namespace
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_pull_secrets: Vec<LocalObjectReference>,

    /// Replica count for control plane components
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_replicas: Option<i32>,

    /// When set, certificate issuance is delegated to an external signer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_management: Option<CertificateManagement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocalObjectReference {
    /// Referenced object name
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateManagement {
    /// PEM-encoded certificate of the external CA
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<String>,

    /// Common name of the signer that issues delegated certificates
    pub signer_name: String,
}

/// Product variant
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum ProductVariant {
    /// Open source variant
    #[default]
    Calico,

    /// Enterprise variant
    TigeraSecureEnterprise,
}

impl ProductVariant {
    /// Lowercase form used to name per-release image sets
    pub fn image_set_prefix(self) -> &'static str {
        match self {
            ProductVariant::Calico => "calico",
            ProductVariant::TigeraSecureEnterprise => "enterprise",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstallationStatus {
    /// Variant that has been installed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<ProductVariant>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_parses_camel_case() {
        let spec: InstallationSpec = serde_yaml::from_str(
            "variant: TigeraSecureEnterprise\nregistry: quay.io/\nimagePullSecrets:\n  - name: pull\ncontrolPlaneReplicas: 3\n",
        )
        .unwrap();
        assert_eq!(spec.variant, ProductVariant::TigeraSecureEnterprise);
        assert_eq!(spec.registry.as_deref(), Some("quay.io/"));
        assert_eq!(spec.image_pull_secrets, vec![LocalObjectReference { name: "pull".to_string() }]);
        assert_eq!(spec.control_plane_replicas, Some(3));
        assert!(spec.certificate_management.is_none());
    }

    #[test]
    fn test_image_set_prefix() {
        assert_eq!(ProductVariant::Calico.image_set_prefix(), "calico");
        assert_eq!(ProductVariant::TigeraSecureEnterprise.image_set_prefix(), "enterprise");
    }
}
