//! Start-up configuration read from the environment.

use crate::error::ControllerError;
use std::net::SocketAddr;
use tracing::info;

pub const DEFAULT_OPERATOR_NAMESPACE: &str = "tigera-operator";
pub const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";
pub const DEFAULT_PRODUCT_RELEASE: &str = "v3.0.0";
pub const DEFAULT_PROBE_ADDR: &str = "0.0.0.0:8080";

/// Controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace holding the operator's input secrets and config maps
    pub operator_namespace: String,
    /// DNS suffix used for service SANs
    pub cluster_domain: String,
    /// Whether the cluster runs OpenShift
    pub openshift: bool,
    /// Release used to select the `ImageSet`
    pub product_release: String,
    /// Listen address of the probe/metrics server
    pub probe_addr: SocketAddr,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            cluster_domain: DEFAULT_CLUSTER_DOMAIN.to_string(),
            openshift: false,
            product_release: DEFAULT_PRODUCT_RELEASE.to_string(),
            probe_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl ControllerConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, applying defaults for unset
    /// variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let probe_addr_raw = var("PROBE_ADDR", DEFAULT_PROBE_ADDR);
        let probe_addr = probe_addr_raw.parse().map_err(|_| {
            ControllerError::InvalidConfig(format!(
                "PROBE_ADDR must be a socket address, got '{probe_addr_raw}'"
            ))
        })?;

        let provider = var("KUBERNETES_PROVIDER", "");

        let config = Self {
            operator_namespace: var("OPERATOR_NAMESPACE", DEFAULT_OPERATOR_NAMESPACE),
            cluster_domain: var("CLUSTER_DOMAIN", DEFAULT_CLUSTER_DOMAIN),
            openshift: provider.eq_ignore_ascii_case("openshift"),
            product_release: var("PRODUCT_RELEASE", DEFAULT_PRODUCT_RELEASE),
            probe_addr,
        };

        if config.cluster_domain.starts_with('.') || config.cluster_domain.ends_with('.') {
            return Err(ControllerError::InvalidConfig(format!(
                "CLUSTER_DOMAIN must not start or end with a dot, got '{}'",
                config.cluster_domain
            )));
        }

        Ok(config)
    }

    pub fn log_summary(&self) {
        info!("Configuration:");
        info!("  Operator namespace: {}", self.operator_namespace);
        info!("  Cluster domain: {}", self.cluster_domain);
        info!("  OpenShift: {}", self.openshift);
        info!("  Product release: {}", self.product_release);
        info!("  Probe address: {}", self.probe_addr);
    }
}
