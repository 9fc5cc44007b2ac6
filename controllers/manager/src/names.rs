//! Fixed names of the objects the controller reads and writes.

/// Name of the Manager service, deployment and service account.
pub const MANAGER_NAME: &str = "tigera-manager";
/// Namespace the Manager workload is rendered into.
pub const MANAGER_NAMESPACE: &str = "tigera-manager";

/// Manager serving certificate (operator namespace)
pub const MANAGER_TLS_SECRET: &str = "manager-tls";
pub const MANAGER_TLS_KEY_FIELD: &str = "key";
pub const MANAGER_TLS_CERT_FIELD: &str = "cert";

/// Standard field names of `kubernetes.io/tls` secrets
pub const TLS_CERT_FIELD: &str = "tls.crt";

pub const ES_PUBLIC_CERT_SECRET: &str = "tigera-secure-es-http-certs-public";
pub const ES_MANAGER_USER_SECRET: &str = "tigera-ee-manager-elasticsearch-access";
pub const KIBANA_PUBLIC_CERT_SECRET: &str = "tigera-secure-kb-http-certs-public";
pub const TUNNEL_SECRET: &str = "tigera-management-cluster-connection";
pub const INTERNAL_MANAGER_TLS_SECRET: &str = "internal-manager-tls";
pub const COMPLIANCE_SERVER_CERT_SECRET: &str = "tigera-compliance-server-tls";
pub const PACKET_CAPTURE_CERT_SECRET: &str = "tigera-packetcapture-server-tls";
pub const PROMETHEUS_TLS_SECRET: &str = "calico-node-prometheus-tls";
pub const DEX_CERT_SECRET: &str = "tigera-dex-tls";

pub const ES_CONFIG_MAP: &str = "tigera-secure-elasticsearch";
pub const KNOWN_JWKS_CONFIG_MAP: &str = "tigera-known-oidc-jwks";

pub const ECK_OPERATOR_NAMESPACE: &str = "tigera-eck-operator";
pub const ECK_LICENSE_CONFIG_MAP: &str = "elastic-licensing";
pub const ECK_LICENSE_LEVEL_FIELD: &str = "eck_license_level";

pub const PROMETHEUS_NAMESPACE: &str = "tigera-prometheus";

/// OIDC client id the Manager UI registers with.
pub const DEX_CLIENT_ID: &str = "tigera-manager";

/// Secrets in the operator and Manager namespaces whose changes trigger a
/// reconcile.
pub const WATCHED_SECRETS: &[&str] = &[
    MANAGER_TLS_SECRET,
    ES_PUBLIC_CERT_SECRET,
    ES_MANAGER_USER_SECRET,
    KIBANA_PUBLIC_CERT_SECRET,
    TUNNEL_SECRET,
    INTERNAL_MANAGER_TLS_SECRET,
    COMPLIANCE_SERVER_CERT_SECRET,
    PACKET_CAPTURE_CERT_SECRET,
    DEX_CERT_SECRET,
    PROMETHEUS_TLS_SECRET,
];

/// Deployments in the Manager namespace whose changes trigger a reconcile.
pub const WATCHED_DEPLOYMENTS: &[&str] = &[MANAGER_NAME];

/// Config maps in the operator namespace whose changes trigger a reconcile.
pub const WATCHED_CONFIG_MAPS: &[&str] = &[ES_CONFIG_MAP, KNOWN_JWKS_CONFIG_MAP];
