//! Dependency gate resolution.
//!
//! Gates run strictly in [`Gate::ORDER`]. Each one inspects live cluster
//! state and either passes, asks the pass to wait, or fails it. Later gates
//! may rely on values stored by earlier ones, so evaluation stops at the
//! first gate that does not pass.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::names::*;
use crate::pki;
use crate::readiness::ReadyFlag;
use crate::reconciler::dependencies::*;
use chrono::{DateTime, Utc};
use cluster_client::ClusterStore;
use crds::{
    Authentication, Installation, LicenseKey, Manager, COMPLIANCE_FEATURE,
    DEFAULT_INSTALLATION_NAME, DEFAULT_INSTANCE_NAME, SUPPORTED_AUTH_TYPE,
};
use k8s_openapi::api::core::v1::Secret;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Requeue delay used while waiting on the license API or license.
pub const LICENSE_REQUEUE: Duration = Duration::from_secs(10);

/// Requeue delay used while waiting on the hub tunnel and internal TLS secrets.
pub const TUNNEL_SECRET_REQUEUE: Duration = Duration::from_secs(10);

/// Named preconditions, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    PrimaryResource,
    ApiServer,
    LicenseApi,
    License,
    Installation,
    ManagerTls,
    Compliance,
    SystemNamespace,
    Elasticsearch,
    KibanaCertificate,
    Topology,
    HubSecrets,
    Authentication,
    KeyValidator,
    ElasticsearchLicense,
    ServingCertificates,
}

impl Gate {
    pub const ORDER: [Gate; 16] = [
        Gate::PrimaryResource,
        Gate::ApiServer,
        Gate::LicenseApi,
        Gate::License,
        Gate::Installation,
        Gate::ManagerTls,
        Gate::Compliance,
        Gate::SystemNamespace,
        Gate::Elasticsearch,
        Gate::KibanaCertificate,
        Gate::Topology,
        Gate::HubSecrets,
        Gate::Authentication,
        Gate::KeyValidator,
        Gate::ElasticsearchLicense,
        Gate::ServingCertificates,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Gate::PrimaryResource => "primary-resource",
            Gate::ApiServer => "api-server",
            Gate::LicenseApi => "license-api",
            Gate::License => "license",
            Gate::Installation => "installation",
            Gate::ManagerTls => "manager-tls",
            Gate::Compliance => "compliance",
            Gate::SystemNamespace => "system-namespace",
            Gate::Elasticsearch => "elasticsearch",
            Gate::KibanaCertificate => "kibana-certificate",
            Gate::Topology => "topology",
            Gate::HubSecrets => "hub-secrets",
            Gate::Authentication => "authentication",
            Gate::KeyValidator => "key-validator",
            Gate::ElasticsearchLicense => "elasticsearch-license",
            Gate::ServingCertificates => "serving-certificates",
        }
    }
}

/// Result of evaluating a single gate.
#[derive(Debug)]
pub enum GateOutcome {
    Pass,
    /// The primary resource does not exist
    Absent,
    /// A dependency is not ready yet; not an error
    Wait {
        reason: String,
        message: String,
        requeue_after: Option<Duration>,
    },
    /// The pass cannot proceed
    Fail {
        reason: String,
        message: String,
        error: ControllerError,
    },
}

impl GateOutcome {
    fn wait(reason: impl Into<String>, message: impl Into<String>) -> Self {
        GateOutcome::Wait {
            reason: reason.into(),
            message: message.into(),
            requeue_after: None,
        }
    }

    fn wait_for(reason: impl Into<String>, message: impl Into<String>, delay: Duration) -> Self {
        GateOutcome::Wait {
            reason: reason.into(),
            message: message.into(),
            requeue_after: Some(delay),
        }
    }

    fn fail(reason: impl Into<String>, error: impl Into<ControllerError>) -> Self {
        let error = error.into();
        GateOutcome::Fail {
            reason: reason.into(),
            message: error.to_string(),
            error,
        }
    }

    /// Fail whose reason is the error text itself.
    fn fail_with_error(error: ControllerError) -> Self {
        GateOutcome::Fail {
            reason: error.to_string(),
            message: String::new(),
            error,
        }
    }
}

/// How resolution ended.
#[derive(Debug)]
pub enum Resolution {
    /// Every gate passed
    Ready(Box<DependencySnapshot>),
    /// The primary resource does not exist
    Absent,
    /// A gate returned `Wait` or `Fail`. `manager` is set once the primary
    /// resource has been read.
    Halted {
        gate: Gate,
        outcome: GateOutcome,
        manager: Option<Box<Manager>>,
    },
    /// The shutdown token fired between gates
    Cancelled,
}

/// Values accumulated while gates pass.
#[derive(Debug, Default)]
struct GateState {
    manager: Option<Manager>,
    license: Option<LicenseKey>,
    installation: Option<Installation>,
    manager_tls: Option<ManagerTlsSecret>,
    compliance_enabled: bool,
    compliance_cert: Option<Secret>,
    pull_secrets: Vec<Secret>,
    es_cluster_config: Option<ElasticsearchClusterConfig>,
    es_credentials: Option<ElasticsearchCredentials>,
    kibana_cert: Option<Secret>,
    role: Option<ClusterRole>,
    tunnel_secret: Option<Secret>,
    internal_traffic_secret: Option<Secret>,
    authentication: Option<Authentication>,
    key_validator: Option<KeyValidatorConfig>,
    es_license: ElasticsearchLicenseType,
    packet_capture_cert: Option<Secret>,
    prometheus_cert: Option<Secret>,
}

impl GateState {
    fn into_snapshot(self) -> Result<DependencySnapshot, ControllerError> {
        let incomplete = |what: &str| ControllerError::NotFound(format!("{what} was not resolved"));
        Ok(DependencySnapshot {
            manager: self.manager.ok_or_else(|| incomplete("Manager"))?,
            license: self.license.ok_or_else(|| incomplete("LicenseKey"))?,
            installation: self.installation.ok_or_else(|| incomplete("Installation"))?,
            manager_tls: self.manager_tls,
            compliance_enabled: self.compliance_enabled,
            compliance_cert: self.compliance_cert,
            pull_secrets: self.pull_secrets,
            es_cluster_config: self
                .es_cluster_config
                .ok_or_else(|| incomplete("elasticsearch configuration"))?,
            es_credentials: self
                .es_credentials
                .ok_or_else(|| incomplete("elasticsearch credentials"))?,
            kibana_cert: self.kibana_cert.ok_or_else(|| incomplete("Kibana certificate"))?,
            role: self.role.unwrap_or(ClusterRole::Standalone),
            tunnel_secret: self.tunnel_secret,
            internal_traffic_secret: self.internal_traffic_secret,
            authentication: self.authentication,
            key_validator: self.key_validator,
            es_license: self.es_license,
            packet_capture_cert: self
                .packet_capture_cert
                .ok_or_else(|| incomplete("packet capture certificate"))?,
            prometheus_cert: self.prometheus_cert,
        })
    }
}

/// Evaluates the gates against the cluster store.
pub struct GateResolver<'a> {
    store: &'a dyn ClusterStore,
    config: &'a ControllerConfig,
    license_api_ready: &'a ReadyFlag,
    now: DateTime<Utc>,
}

impl std::fmt::Debug for GateResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateResolver").field("now", &self.now).finish_non_exhaustive()
    }
}

impl<'a> GateResolver<'a> {
    pub fn new(
        store: &'a dyn ClusterStore,
        config: &'a ControllerConfig,
        license_api_ready: &'a ReadyFlag,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            store,
            config,
            license_api_ready,
            now,
        }
    }

    /// Runs every gate in order, stopping at the first that does not pass.
    pub async fn resolve(&self, cancel: &CancellationToken) -> Resolution {
        let mut state = GateState::default();

        for gate in Gate::ORDER {
            if cancel.is_cancelled() {
                return Resolution::Cancelled;
            }

            match self.evaluate(gate, &mut state).await {
                GateOutcome::Pass => debug!(gate = gate.name(), "Gate passed"),
                GateOutcome::Absent => return Resolution::Absent,
                outcome => {
                    return Resolution::Halted {
                        gate,
                        outcome,
                        manager: state.manager.map(Box::new),
                    };
                }
            }
        }

        let manager = state.manager.clone().map(Box::new);
        match state.into_snapshot() {
            Ok(snapshot) => Resolution::Ready(Box::new(snapshot)),
            Err(error) => Resolution::Halted {
                gate: Gate::ServingCertificates,
                outcome: GateOutcome::fail("Dependency resolution incomplete", error),
                manager,
            },
        }
    }

    async fn evaluate(&self, gate: Gate, state: &mut GateState) -> GateOutcome {
        match gate {
            Gate::PrimaryResource => self.check_primary_resource(state).await,
            Gate::ApiServer => self.check_api_server().await,
            Gate::LicenseApi => self.check_license_api(),
            Gate::License => self.check_license(state).await,
            Gate::Installation => self.check_installation(state).await,
            Gate::ManagerTls => self.check_manager_tls(state).await,
            Gate::Compliance => self.check_compliance(state).await,
            Gate::SystemNamespace => self.check_system_namespace().await,
            Gate::Elasticsearch => self.check_elasticsearch(state).await,
            Gate::KibanaCertificate => self.check_kibana_certificate(state).await,
            Gate::Topology => self.check_topology(state).await,
            Gate::HubSecrets => self.check_hub_secrets(state).await,
            Gate::Authentication => self.check_authentication(state).await,
            Gate::KeyValidator => self.check_key_validator(state).await,
            Gate::ElasticsearchLicense => self.check_elasticsearch_license(state).await,
            Gate::ServingCertificates => self.check_serving_certificates(state).await,
        }
    }

    fn operator_namespace(&self) -> &str {
        &self.config.operator_namespace
    }

    async fn check_primary_resource(&self, state: &mut GateState) -> GateOutcome {
        let manager = match self.store.get_manager(DEFAULT_INSTANCE_NAME).await {
            Ok(Some(manager)) => manager,
            Ok(None) => return GateOutcome::Absent,
            Err(e) => return GateOutcome::fail("Error querying Manager", e),
        };

        let unsupported = manager.unsupported_auth_type().map(str::to_string);
        state.manager = Some(manager);

        match unsupported {
            Some(auth_type) => GateOutcome::fail(
                "Error querying Manager",
                ControllerError::InvalidConfig(format!(
                    "auth type '{auth_type}' is not supported; auth types other than '{SUPPORTED_AUTH_TYPE}' \
                     can no longer be configured using the Manager resource, use the Authentication resource instead"
                )),
            ),
            None => GateOutcome::Pass,
        }
    }

    async fn check_api_server(&self) -> GateOutcome {
        match self.store.get_api_server(DEFAULT_INSTANCE_NAME).await {
            Ok(Some(api_server)) if api_server.is_ready() => GateOutcome::Pass,
            Ok(_) => GateOutcome::wait("Waiting for Tigera API server to be ready", ""),
            Err(e) => GateOutcome::wait("Waiting for Tigera API server to be ready", e.to_string()),
        }
    }

    fn check_license_api(&self) -> GateOutcome {
        if self.license_api_ready.is_ready() {
            GateOutcome::Pass
        } else {
            GateOutcome::wait_for("Waiting for LicenseKeyAPI to be ready", "", LICENSE_REQUEUE)
        }
    }

    async fn check_license(&self, state: &mut GateState) -> GateOutcome {
        let license = match self.store.get_license_key(DEFAULT_INSTALLATION_NAME).await {
            Ok(Some(license)) => license,
            Ok(None) => {
                return GateOutcome::wait_for(
                    "License not found",
                    format!("LicenseKey {DEFAULT_INSTALLATION_NAME} does not exist"),
                    LICENSE_REQUEUE,
                );
            }
            Err(e) => return GateOutcome::fail("Error querying license", e),
        };

        if license.is_expired(self.now) {
            return GateOutcome::fail(
                "License expired",
                ControllerError::InvalidConfig("the installed LicenseKey has expired".to_string()),
            );
        }

        state.compliance_enabled = license.is_feature_active(COMPLIANCE_FEATURE);
        state.license = Some(license);
        GateOutcome::Pass
    }

    async fn check_installation(&self, state: &mut GateState) -> GateOutcome {
        match self.store.get_installation(DEFAULT_INSTALLATION_NAME).await {
            Ok(Some(installation)) => {
                state.installation = Some(installation);
                GateOutcome::Pass
            }
            Ok(None) => GateOutcome::fail(
                "Installation not found",
                ControllerError::NotFound(format!("Installation {DEFAULT_INSTALLATION_NAME}")),
            ),
            Err(e) => GateOutcome::fail("Error querying installation", e),
        }
    }

    async fn check_manager_tls(&self, state: &mut GateState) -> GateOutcome {
        const REASON: &str = "Error validating manager TLS certificate";

        let secret = match self
            .store
            .get_secret(self.operator_namespace(), MANAGER_TLS_SECRET)
            .await
        {
            Ok(Some(secret)) => secret,
            Ok(None) => return GateOutcome::Pass,
            Err(e) => return GateOutcome::fail(REASON, e),
        };

        let validated = pki::require_secret_field(&secret, MANAGER_TLS_KEY_FIELD)
            .and_then(|key_pem| {
                let cert_pem = pki::require_secret_field(&secret, MANAGER_TLS_CERT_FIELD)?;
                let info = pki::validate_key_pair(&key_pem, &cert_pem)?;
                Ok(ManagerTlsSecret {
                    key_pem,
                    cert_pem,
                    info,
                })
            });

        match validated {
            Ok(tls) => {
                state.manager_tls = Some(tls);
                GateOutcome::Pass
            }
            Err(e) => GateOutcome::fail(REASON, e),
        }
    }

    async fn check_compliance(&self, state: &mut GateState) -> GateOutcome {
        if !state.compliance_enabled {
            return GateOutcome::Pass;
        }

        match self.store.get_compliance(DEFAULT_INSTANCE_NAME).await {
            Ok(Some(compliance)) if compliance.is_ready() => {}
            Ok(Some(compliance)) => {
                return GateOutcome::wait(
                    "Compliance is not ready",
                    format!(
                        "compliance status: {}",
                        crds::reported_state(compliance.status.as_ref())
                    ),
                );
            }
            Ok(None) => {
                return GateOutcome::fail(
                    "Compliance not found",
                    ControllerError::NotFound(format!("Compliance {DEFAULT_INSTANCE_NAME}")),
                );
            }
            Err(e) => return GateOutcome::fail("Error querying compliance", e),
        }

        match self
            .serving_certificate(COMPLIANCE_SERVER_CERT_SECRET)
            .await
        {
            Ok(Some(secret)) => {
                state.compliance_cert = Some(secret);
                GateOutcome::Pass
            }
            Ok(None) => GateOutcome::wait(
                format!("Waiting for secret '{COMPLIANCE_SERVER_CERT_SECRET}' to become available"),
                "",
            ),
            Err(e) => GateOutcome::fail(format!("Failed to retrieve {COMPLIANCE_SERVER_CERT_SECRET}"), e),
        }
    }

    async fn check_system_namespace(&self) -> GateOutcome {
        match self.store.namespace_exists(PROMETHEUS_NAMESPACE).await {
            Ok(true) => GateOutcome::Pass,
            Ok(false) => GateOutcome::Fail {
                reason: format!("{PROMETHEUS_NAMESPACE} namespace does not exist"),
                message: format!("Dependency on {PROMETHEUS_NAMESPACE} not satisfied"),
                error: ControllerError::NotFound(format!("Namespace {PROMETHEUS_NAMESPACE}")),
            },
            Err(e) => GateOutcome::fail("Error querying prometheus", e),
        }
    }

    async fn check_elasticsearch(&self, state: &mut GateState) -> GateOutcome {
        let ns = self.operator_namespace();

        let pull_secret_names = state
            .installation
            .as_ref()
            .map(|i| i.spec.image_pull_secrets.clone())
            .unwrap_or_default();
        for reference in pull_secret_names {
            match self.store.get_secret(ns, &reference.name).await {
                Ok(Some(secret)) => state.pull_secrets.push(secret),
                Ok(None) => {
                    return GateOutcome::fail(
                        "Error retrieving pull secrets",
                        ControllerError::NotFound(format!("pull secret {ns}/{}", reference.name)),
                    );
                }
                Err(e) => return GateOutcome::fail("Error retrieving pull secrets", e),
            }
        }

        const CONFIG_REASON: &str = "Failed to get the elasticsearch cluster configuration";
        let cluster_config = match self.store.get_config_map(ns, ES_CONFIG_MAP).await {
            Ok(Some(cm)) => match ElasticsearchClusterConfig::from_config_map(&cm) {
                Ok(config) => config,
                Err(e) => return GateOutcome::fail(CONFIG_REASON, e),
            },
            Ok(None) => {
                return GateOutcome::wait(
                    "Elasticsearch cluster configuration is not available, waiting for it to become available",
                    format!("config map {ns}/{ES_CONFIG_MAP} not found"),
                );
            }
            Err(e) => return GateOutcome::fail(CONFIG_REASON, e),
        };

        const CREDENTIALS_REASON: &str = "Failed to get Elasticsearch credentials";
        let user_secret = match self.store.get_secret(ns, ES_MANAGER_USER_SECRET).await {
            Ok(secret) => secret,
            Err(e) => return GateOutcome::fail(CREDENTIALS_REASON, e),
        };
        let public_cert = match self.store.get_secret(ns, ES_PUBLIC_CERT_SECRET).await {
            Ok(secret) => secret,
            Err(e) => return GateOutcome::fail(CREDENTIALS_REASON, e),
        };
        let (Some(user_secret), Some(public_cert)) = (user_secret, public_cert) else {
            return GateOutcome::wait(
                "Elasticsearch secrets are not available yet, waiting until they become available",
                format!("secrets {ES_MANAGER_USER_SECRET} and {ES_PUBLIC_CERT_SECRET} are required"),
            );
        };

        match ElasticsearchCredentials::validate(user_secret, public_cert) {
            Ok(credentials) => {
                state.es_cluster_config = Some(cluster_config);
                state.es_credentials = Some(credentials);
                GateOutcome::Pass
            }
            Err(e) => GateOutcome::fail(CREDENTIALS_REASON, e),
        }
    }

    async fn check_kibana_certificate(&self, state: &mut GateState) -> GateOutcome {
        const REASON: &str = "Failed to read Kibana public cert secret";
        match self.serving_certificate(KIBANA_PUBLIC_CERT_SECRET).await {
            Ok(Some(secret)) => {
                state.kibana_cert = Some(secret);
                GateOutcome::Pass
            }
            Ok(None) => GateOutcome::fail(
                REASON,
                ControllerError::NotFound(format!(
                    "secret {}/{KIBANA_PUBLIC_CERT_SECRET}",
                    self.operator_namespace()
                )),
            ),
            Err(e) => GateOutcome::fail(REASON, e),
        }
    }

    async fn check_topology(&self, state: &mut GateState) -> GateOutcome {
        let hub = match self.store.get_management_cluster(DEFAULT_INSTANCE_NAME).await {
            Ok(hub) => hub,
            Err(e) => return GateOutcome::fail("Error reading ManagementCluster", e),
        };
        let spoke = match self
            .store
            .get_management_cluster_connection(DEFAULT_INSTANCE_NAME)
            .await
        {
            Ok(spoke) => spoke,
            Err(e) => return GateOutcome::fail("Error reading ManagementClusterConnection", e),
        };

        state.role = Some(match (hub, spoke) {
            (Some(_), Some(_)) => {
                return GateOutcome::fail_with_error(ControllerError::Conflict(
                    "having both a ManagementCluster and a ManagementClusterConnection is not supported"
                        .to_string(),
                ));
            }
            (Some(_), None) => ClusterRole::Hub,
            (None, Some(_)) => ClusterRole::Spoke,
            (None, None) => ClusterRole::Standalone,
        });
        GateOutcome::Pass
    }

    async fn check_hub_secrets(&self, state: &mut GateState) -> GateOutcome {
        if state.role != Some(ClusterRole::Hub) {
            return GateOutcome::Pass;
        }
        let ns = self.operator_namespace();

        const TUNNEL_REASON: &str =
            "Failed to check for the existence of management-cluster-connection secret";
        match self.store.get_secret(ns, TUNNEL_SECRET).await {
            Ok(Some(secret)) => state.tunnel_secret = Some(secret),
            Ok(None) => {
                return GateOutcome::wait_for(
                    TUNNEL_REASON,
                    format!("secret {ns}/{TUNNEL_SECRET} not found"),
                    TUNNEL_SECRET_REQUEUE,
                );
            }
            Err(e) => return GateOutcome::fail(TUNNEL_REASON, e),
        }

        match self.store.get_secret(ns, INTERNAL_MANAGER_TLS_SECRET).await {
            Ok(Some(secret)) => {
                state.internal_traffic_secret = Some(secret);
                GateOutcome::Pass
            }
            Ok(None) => GateOutcome::wait_for(
                format!(
                    "Waiting for secret {INTERNAL_MANAGER_TLS_SECRET} in namespace {ns} to be available"
                ),
                "",
                TUNNEL_SECRET_REQUEUE,
            ),
            Err(e) => GateOutcome::fail(
                format!("Error fetching TLS secret {INTERNAL_MANAGER_TLS_SECRET} in namespace {ns}"),
                e,
            ),
        }
    }

    async fn check_authentication(&self, state: &mut GateState) -> GateOutcome {
        match self.store.get_authentication(DEFAULT_INSTANCE_NAME).await {
            Ok(None) => GateOutcome::Pass,
            Ok(Some(auth)) if auth.is_ready() => {
                state.authentication = Some(auth);
                GateOutcome::Pass
            }
            Ok(Some(auth)) => GateOutcome::wait(
                "Authentication is not ready",
                format!("authentication status: {}", auth.state()),
            ),
            Err(e) => GateOutcome::fail("Error while fetching Authentication", e),
        }
    }

    async fn check_key_validator(&self, state: &mut GateState) -> GateOutcome {
        const REASON: &str = "Failed to process the authentication CR.";
        let Some(auth) = state.authentication.as_ref() else {
            return GateOutcome::Pass;
        };

        let known_jwks = match self
            .store
            .get_config_map(self.operator_namespace(), KNOWN_JWKS_CONFIG_MAP)
            .await
        {
            Ok(cm) => cm,
            Err(e) => return GateOutcome::fail(REASON, e),
        };

        match KeyValidatorConfig::derive(auth, known_jwks) {
            Ok(config) => {
                state.key_validator = Some(config);
                GateOutcome::Pass
            }
            Err(e) => GateOutcome::fail(REASON, e),
        }
    }

    async fn check_elasticsearch_license(&self, state: &mut GateState) -> GateOutcome {
        const REASON: &str = "Failed to get Elasticsearch license";
        if state.role == Some(ClusterRole::Spoke) {
            return GateOutcome::Pass;
        }

        match self
            .store
            .get_config_map(ECK_OPERATOR_NAMESPACE, ECK_LICENSE_CONFIG_MAP)
            .await
        {
            Ok(Some(cm)) => {
                let level = cm
                    .data
                    .as_ref()
                    .and_then(|d| d.get(ECK_LICENSE_LEVEL_FIELD))
                    .map_or("", String::as_str);
                state.es_license = ElasticsearchLicenseType::from_level(level);
                GateOutcome::Pass
            }
            Ok(None) => GateOutcome::fail(
                REASON,
                ControllerError::NotFound(format!(
                    "config map {ECK_OPERATOR_NAMESPACE}/{ECK_LICENSE_CONFIG_MAP}"
                )),
            ),
            Err(e) => GateOutcome::fail(REASON, e),
        }
    }

    async fn check_serving_certificates(&self, state: &mut GateState) -> GateOutcome {
        match self.serving_certificate(PACKET_CAPTURE_CERT_SECRET).await {
            Ok(Some(secret)) => state.packet_capture_cert = Some(secret),
            Ok(None) => {
                return GateOutcome::wait(
                    format!("Waiting for secret '{PACKET_CAPTURE_CERT_SECRET}' to become available"),
                    "",
                );
            }
            Err(e) => {
                return GateOutcome::fail(format!("Failed to retrieve {PACKET_CAPTURE_CERT_SECRET}"), e);
            }
        }

        match self.serving_certificate(PROMETHEUS_TLS_SECRET).await {
            Ok(secret) => {
                state.prometheus_cert = secret;
                GateOutcome::Pass
            }
            Err(e) => GateOutcome::fail(format!("Failed to retrieve {PROMETHEUS_TLS_SECRET}"), e),
        }
    }

    /// Reads a `kubernetes.io/tls` style secret from the operator namespace
    /// and checks its certificate parses. Absence is `Ok(None)`.
    async fn serving_certificate(&self, name: &str) -> Result<Option<Secret>, ControllerError> {
        let Some(secret) = self
            .store
            .get_secret(self.operator_namespace(), name)
            .await
            .map_err(ControllerError::from)?
        else {
            return Ok(None);
        };
        let cert = pki::require_secret_field(&secret, TLS_CERT_FIELD)?;
        pki::parse_certificate(&cert)?;
        Ok(Some(secret))
    }
}
