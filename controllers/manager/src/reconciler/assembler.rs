//! Pure assembly of the rendering inputs.

use crate::config::ControllerConfig;
use crate::reconciler::certificates::CertificateBundle;
use crate::reconciler::dependencies::{
    ClusterRole, DependencySnapshot, ElasticsearchClusterConfig, ElasticsearchCredentials,
    ElasticsearchLicenseType, KeyValidatorConfig,
};
use crds::ProductVariant;
use k8s_openapi::api::core::v1::Secret;

/// Control-plane replica count when the installation does not set one.
pub const DEFAULT_REPLICAS: i32 = 2;

/// Registry used when the installation does not override it.
pub const DEFAULT_REGISTRY: &str = "quay.io/";

/// Everything the renderer needs, already validated.
#[derive(Debug, Clone)]
pub struct ConfigurationSnapshot {
    pub openshift: bool,
    pub cluster_domain: String,
    pub operator_namespace: String,
    pub variant: ProductVariant,
    pub registry: String,
    pub image_path: Option<String>,
    pub release: String,
    pub replicas: i32,
    pub pull_secrets: Vec<Secret>,
    pub tls: Option<CertificateBundle>,
    pub es_cluster_config: ElasticsearchClusterConfig,
    pub es_credentials: ElasticsearchCredentials,
    pub es_license: ElasticsearchLicenseType,
    pub kibana_cert: Secret,
    pub compliance_enabled: bool,
    pub compliance_cert: Option<Secret>,
    pub packet_capture_cert: Secret,
    pub prometheus_cert: Option<Secret>,
    pub role: ClusterRole,
    pub tunnel_secret: Option<Secret>,
    pub internal_traffic_secret: Option<Secret>,
    pub key_validator: Option<KeyValidatorConfig>,
}

/// Combines the resolved dependencies and the certificate bundle. Hub and
/// spoke clusters always run a single replica.
pub fn assemble(
    deps: &DependencySnapshot,
    tls: Option<CertificateBundle>,
    config: &ControllerConfig,
) -> ConfigurationSnapshot {
    let installation = &deps.installation.spec;
    let replicas = if deps.role.is_multi_cluster() {
        1
    } else {
        installation.control_plane_replicas.unwrap_or(DEFAULT_REPLICAS)
    };

    let registry = match installation.registry.as_deref() {
        Some(r) if r.ends_with('/') => r.to_string(),
        Some(r) if !r.is_empty() => format!("{r}/"),
        _ => DEFAULT_REGISTRY.to_string(),
    };

    ConfigurationSnapshot {
        openshift: config.openshift,
        cluster_domain: config.cluster_domain.clone(),
        operator_namespace: config.operator_namespace.clone(),
        variant: installation.variant,
        registry,
        image_path: installation.image_path.clone().filter(|p| !p.is_empty()),
        release: config.product_release.clone(),
        replicas,
        pull_secrets: deps.pull_secrets.clone(),
        tls,
        es_cluster_config: deps.es_cluster_config.clone(),
        es_credentials: deps.es_credentials.clone(),
        es_license: deps.es_license,
        kibana_cert: deps.kibana_cert.clone(),
        compliance_enabled: deps.compliance_enabled,
        compliance_cert: deps.compliance_cert.clone(),
        packet_capture_cert: deps.packet_capture_cert.clone(),
        prometheus_cert: deps.prometheus_cert.clone(),
        role: deps.role,
        tunnel_secret: deps.tunnel_secret.clone(),
        internal_traffic_secret: deps.internal_traffic_secret.clone(),
        key_validator: deps.key_validator.clone(),
    }
}
