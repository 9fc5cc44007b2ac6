//! Test utilities for unit testing the reconciler
//!
//! Fixtures describe a cluster in which every dependency of the Manager is
//! satisfied. Tests start from there and remove or break one thing.

use crate::config::{ControllerConfig, DEFAULT_OPERATOR_NAMESPACE};
use crate::names::*;
use crate::pki::{synthesize_self_signed, GeneratedKeyPair};
use crate::readiness::ReadyFlag;
use crate::reconciler::dependencies::{
    ClusterRole, DependencySnapshot, ElasticsearchClusterConfig, ElasticsearchCredentials, ElasticsearchLicenseType,
};
use crate::reconciler::Reconciler;
use crate::render::ManagerRenderer;
use cluster_client::{ClusterStore, MockClusterStore};
use crds::*;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// A serving certificate shared by every fixture
pub fn test_certificate() -> &'static GeneratedKeyPair {
    static CERT: OnceLock<GeneratedKeyPair> = OnceLock::new();
    CERT.get_or_init(|| {
        synthesize_self_signed(&["fixture.local".to_string()], ::time::OffsetDateTime::now_utc()).unwrap()
    })
}

/// Secret in the operator namespace with the given data
pub fn secret_with(name: &str, entries: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(DEFAULT_OPERATOR_NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        ..Default::default()
    }
}

/// `tls.crt` secret holding the fixture certificate
pub fn tls_secret(name: &str) -> Secret {
    secret_with(name, &[(TLS_CERT_FIELD, &test_certificate().cert_pem)])
}

/// Config map with the given data
pub fn config_map(namespace: &str, name: &str, entries: &[(&str, &str)]) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        ),
        ..Default::default()
    }
}

pub fn manager() -> Manager {
    let mut manager = Manager::new(DEFAULT_INSTANCE_NAME, ManagerSpec::default());
    manager.metadata.uid = Some("4a1c2f0e-manager".to_string());
    manager
}

pub fn api_server(state: &str) -> APIServer {
    let mut api_server = APIServer::new(DEFAULT_INSTANCE_NAME, APIServerSpec {});
    api_server.status = Some(ComponentStatus {
        state: state.to_string(),
    });
    api_server
}

pub fn compliance(state: &str) -> Compliance {
    let mut compliance = Compliance::new(DEFAULT_INSTANCE_NAME, ComplianceSpec {});
    compliance.status = Some(ComponentStatus {
        state: state.to_string(),
    });
    compliance
}

pub fn license(features: &[&str]) -> LicenseKey {
    let mut license = LicenseKey::new(
        DEFAULT_INSTALLATION_NAME,
        LicenseKeySpec {
            token: "token".to_string(),
            certificate: None,
        },
    );
    license.status = Some(LicenseKeyStatus {
        expiry: Some(chrono::Utc::now() + chrono::Duration::days(365)),
        features: features.iter().map(|f| f.to_string()).collect(),
    });
    license
}

pub fn installation() -> Installation {
    Installation::new(
        DEFAULT_INSTALLATION_NAME,
        InstallationSpec {
            variant: ProductVariant::TigeraSecureEnterprise,
            control_plane_replicas: Some(2),
            ..Default::default()
        },
    )
}

pub fn es_cluster_config_map() -> ConfigMap {
    config_map(
        DEFAULT_OPERATOR_NAMESPACE,
        ES_CONFIG_MAP,
        &[("clusterName", "cluster"), ("replicas", "1"), ("shards", "5")],
    )
}

pub fn es_user_secret() -> Secret {
    secret_with(ES_MANAGER_USER_SECRET, &[("username", "tigera-ee-manager"), ("password", "secret")])
}

pub fn eck_license_config_map(level: &str) -> ConfigMap {
    config_map(ECK_OPERATOR_NAMESPACE, ECK_LICENSE_CONFIG_MAP, &[(ECK_LICENSE_LEVEL_FIELD, level)])
}

pub fn namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Mock store in which every gate passes
pub fn satisfied_store() -> MockClusterStore {
    let store = MockClusterStore::new();
    store.add(&manager());
    store.add(&api_server(STATE_READY));
    store.add(&license(&[]));
    store.add(&installation());
    store.add(&namespace(PROMETHEUS_NAMESPACE));
    store.add(&es_cluster_config_map());
    store.add(&es_user_secret());
    store.add(&tls_secret(ES_PUBLIC_CERT_SECRET));
    store.add(&tls_secret(KIBANA_PUBLIC_CERT_SECRET));
    store.add(&eck_license_config_map("basic"));
    store.add(&tls_secret(PACKET_CAPTURE_CERT_SECRET));
    store.set_license_api_available(true);
    store
}

/// The snapshot a satisfied store resolves to
pub fn satisfied_snapshot() -> DependencySnapshot {
    DependencySnapshot {
        manager: manager(),
        license: license(&[]),
        installation: installation(),
        manager_tls: None,
        compliance_enabled: false,
        compliance_cert: None,
        pull_secrets: Vec::new(),
        es_cluster_config: ElasticsearchClusterConfig {
            cluster_name: "cluster".to_string(),
            replicas: 1,
            shards: 5,
            flow_shards: 5,
        },
        es_credentials: ElasticsearchCredentials {
            user_secret: es_user_secret(),
            public_cert: tls_secret(ES_PUBLIC_CERT_SECRET),
        },
        kibana_cert: tls_secret(KIBANA_PUBLIC_CERT_SECRET),
        role: ClusterRole::Standalone,
        tunnel_secret: None,
        internal_traffic_secret: None,
        authentication: None,
        key_validator: None,
        es_license: ElasticsearchLicenseType::Basic,
        packet_capture_cert: tls_secret(PACKET_CAPTURE_CERT_SECRET),
        prometheus_cert: None,
    }
}

pub fn with_certificate_management(mut snapshot: DependencySnapshot, signer: &str) -> DependencySnapshot {
    snapshot.installation.spec.certificate_management = Some(CertificateManagement {
        ca_cert: None,
        signer_name: signer.to_string(),
    });
    snapshot
}

/// Reconciler over `store` with the license API already available
pub fn reconciler(store: &MockClusterStore) -> Reconciler {
    let flag = ReadyFlag::new();
    flag.mark_ready();
    reconciler_with_flag(store, flag)
}

pub fn reconciler_with_flag(store: &MockClusterStore, flag: ReadyFlag) -> Reconciler {
    let store: Arc<dyn ClusterStore> = Arc::new(store.clone());
    Reconciler::new(store, Arc::new(ManagerRenderer), ControllerConfig::default(), flag)
}
