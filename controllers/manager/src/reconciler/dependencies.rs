//! Prerequisite state gathered by the gate resolver.

use crate::error::ControllerError;
use crate::names::{DEX_CLIENT_ID, TLS_CERT_FIELD};
use crate::pki::{self, CertificateInfo};
use crds::{Authentication, Installation, LicenseKey, Manager, OidcType};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use serde::Serialize;

/// Topology role of this cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClusterRole {
    Standalone,
    /// A `ManagementCluster` exists
    Hub,
    /// A `ManagementClusterConnection` exists
    Spoke,
}

impl ClusterRole {
    pub fn is_multi_cluster(self) -> bool {
        !matches!(self, ClusterRole::Standalone)
    }
}

/// A structurally valid Manager TLS secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerTlsSecret {
    pub key_pem: String,
    pub cert_pem: String,
    pub info: CertificateInfo,
}

/// Search-index cluster settings published by the log storage controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElasticsearchClusterConfig {
    pub cluster_name: String,
    pub replicas: i32,
    pub shards: i32,
    pub flow_shards: i32,
}

impl ElasticsearchClusterConfig {
    /// Parses the `tigera-secure-elasticsearch` config map. `flowShards`
    /// falls back to `shards` when absent.
    pub fn from_config_map(cm: &ConfigMap) -> Result<Self, ControllerError> {
        let data = cm.data.as_ref();
        let get = |field: &str| data.and_then(|d| d.get(field)).map(String::as_str);
        let number = |field: &str| -> Result<Option<i32>, ControllerError> {
            get(field)
                .map(|raw| {
                    raw.trim().parse::<i32>().map_err(|_| {
                        ControllerError::InvalidConfig(format!(
                            "elasticsearch config field {field} is not a number: '{raw}'"
                        ))
                    })
                })
                .transpose()
        };
        let missing = |field: &str| {
            ControllerError::InvalidConfig(format!("elasticsearch config is missing field {field}"))
        };

        let cluster_name = get("clusterName")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| missing("clusterName"))?
            .to_string();
        let replicas = number("replicas")?.ok_or_else(|| missing("replicas"))?;
        let shards = number("shards")?.ok_or_else(|| missing("shards"))?;
        let flow_shards = number("flowShards")?.unwrap_or(shards);

        Ok(Self {
            cluster_name,
            replicas,
            shards,
            flow_shards,
        })
    }
}

/// Credentials the Manager uses to reach the search index.
#[derive(Debug, Clone, PartialEq)]
pub struct ElasticsearchCredentials {
    pub user_secret: Secret,
    pub public_cert: Secret,
}

impl ElasticsearchCredentials {
    /// Checks both secrets carry the expected fields.
    pub fn validate(user_secret: Secret, public_cert: Secret) -> Result<Self, ControllerError> {
        for field in ["username", "password"] {
            pki::require_secret_field(&user_secret, field)?;
        }
        let cert = pki::require_secret_field(&public_cert, TLS_CERT_FIELD)?;
        pki::parse_certificate(&cert)?;
        Ok(Self {
            user_secret,
            public_cert,
        })
    }
}

/// License tier of the search-index operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ElasticsearchLicenseType {
    Basic,
    Enterprise,
    EnterpriseTrial,
    #[default]
    Unknown,
}

impl ElasticsearchLicenseType {
    pub fn from_level(level: &str) -> Self {
        match level.trim() {
            "basic" => Self::Basic,
            "enterprise" => Self::Enterprise,
            "enterprise_trial" => Self::EnterpriseTrial,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Enterprise => "enterprise",
            Self::EnterpriseTrial => "enterprise_trial",
            Self::Unknown => "unknown",
        }
    }
}

/// Token validation settings derived from the `Authentication` resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyValidatorConfig {
    pub issuer: String,
    pub client_id: String,
    pub username_claim: String,
    pub groups_claim: Option<String>,
    pub username_prefix: Option<String>,
    pub groups_prefix: Option<String>,
    pub oidc_type: OidcType,
    /// Well-known JWKS for providers validated directly
    #[serde(skip)]
    pub known_jwks: Option<ConfigMap>,
}

impl KeyValidatorConfig {
    /// Derives the validator config. `Dex` tokens are issued by the bundled
    /// broker under `<managerDomain>/dex`; `Tigera` tokens come straight
    /// from the configured provider.
    pub fn derive(auth: &Authentication, known_jwks: Option<ConfigMap>) -> Result<Self, ControllerError> {
        let domain = auth.spec.manager_domain.trim().trim_end_matches('/');
        if !domain.starts_with("https://") || domain.len() <= "https://".len() {
            return Err(ControllerError::InvalidConfig(format!(
                "managerDomain must be an https URL, got '{}'",
                auth.spec.manager_domain
            )));
        }

        let oidc = auth.spec.oidc.clone().unwrap_or_default();
        let oidc_type = auth.spec.oidc.as_ref().map_or(OidcType::Dex, |o| o.oidc_type);
        let username_claim = if oidc.username_claim.is_empty() {
            "email".to_string()
        } else {
            oidc.username_claim
        };

        let (issuer, known_jwks) = match oidc_type {
            OidcType::Dex => (format!("{domain}/dex"), None),
            OidcType::Tigera => {
                if oidc.issuer_url.trim().is_empty() {
                    return Err(ControllerError::InvalidConfig(
                        "oidc.issuerURL is required for the Tigera OIDC type".to_string(),
                    ));
                }
                (oidc.issuer_url.trim_end_matches('/').to_string(), known_jwks)
            }
        };

        Ok(Self {
            issuer,
            client_id: DEX_CLIENT_ID.to_string(),
            username_claim,
            groups_claim: oidc.groups_claim,
            username_prefix: oidc.username_prefix,
            groups_prefix: oidc.groups_prefix,
            oidc_type,
            known_jwks,
        })
    }
}

/// Everything the gates fetched during one pass. Built fresh every pass.
#[derive(Debug, Clone)]
pub struct DependencySnapshot {
    pub manager: Manager,
    pub license: LicenseKey,
    pub installation: Installation,
    pub manager_tls: Option<ManagerTlsSecret>,
    pub compliance_enabled: bool,
    pub compliance_cert: Option<Secret>,
    pub pull_secrets: Vec<Secret>,
    pub es_cluster_config: ElasticsearchClusterConfig,
    pub es_credentials: ElasticsearchCredentials,
    pub kibana_cert: Secret,
    pub role: ClusterRole,
    pub tunnel_secret: Option<Secret>,
    pub internal_traffic_secret: Option<Secret>,
    pub authentication: Option<Authentication>,
    pub key_validator: Option<KeyValidatorConfig>,
    pub es_license: ElasticsearchLicenseType,
    pub packet_capture_cert: Secret,
    pub prometheus_cert: Option<Secret>,
}
