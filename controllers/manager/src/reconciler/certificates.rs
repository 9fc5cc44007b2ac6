//! Manager TLS certificate lifecycle.

use crate::config::ControllerConfig;
use crate::names::{MANAGER_NAME, MANAGER_NAMESPACE, MANAGER_TLS_CERT_FIELD, MANAGER_TLS_KEY_FIELD, MANAGER_TLS_SECRET};
use crate::pki::{self, CertificateError};
use crate::reconciler::dependencies::DependencySnapshot;
use chrono::{DateTime, Utc};
use cluster_client::ManagedObject;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Where the serving certificate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Synthesized or previously synthesized by this controller
    OperatorManaged,
    /// Supplied by the user and left untouched
    UserProvided,
    /// Signed by the installation's external signer
    ExternallyIssued,
}

/// The key and certificate the Manager serves with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateBundle {
    pub key_pem: String,
    pub cert_pem: String,
    pub provenance: Provenance,
}

impl CertificateBundle {
    /// Whether the bundle is re-applied ahead of the rendered component.
    pub fn needs_passthrough(&self) -> bool {
        self.provenance != Provenance::UserProvided
    }

    /// Builds a `manager-tls` secret in `namespace` holding this bundle.
    pub fn to_secret(&self, namespace: &str) -> Secret {
        let mut data = BTreeMap::new();
        data.insert(MANAGER_TLS_KEY_FIELD.to_string(), ByteString(self.key_pem.clone().into_bytes()));
        data.insert(MANAGER_TLS_CERT_FIELD.to_string(), ByteString(self.cert_pem.clone().into_bytes()));
        Secret {
            metadata: ObjectMeta {
                name: Some(MANAGER_TLS_SECRET.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            type_: Some("Opaque".to_string()),
            data: Some(data),
            ..Default::default()
        }
    }

    /// The passthrough object re-applying the bundle in the operator
    /// namespace, if this provenance calls for one.
    pub fn passthrough(&self, operator_namespace: &str) -> Result<Option<ManagedObject>, CertificateError> {
        if !self.needs_passthrough() {
            return Ok(None);
        }
        ManagedObject::from_resource(&self.to_secret(operator_namespace))
            .map(Some)
            .map_err(|e| CertificateError::Generation(e.to_string()))
    }
}

/// DNS names the Manager service answers to, plus `localhost`.
pub fn service_dns_names(cluster_domain: &str) -> Vec<String> {
    vec![
        MANAGER_NAME.to_string(),
        format!("{MANAGER_NAME}.{MANAGER_NAMESPACE}"),
        format!("{MANAGER_NAME}.{MANAGER_NAMESPACE}.svc"),
        format!("{MANAGER_NAME}.{MANAGER_NAMESPACE}.svc.{cluster_domain}"),
        "localhost".to_string(),
    ]
}

fn same_names(a: &[String], b: &[String]) -> bool {
    a.iter().collect::<BTreeSet<_>>() == b.iter().collect::<BTreeSet<_>>()
}

fn synthesize(dns_names: &[String], now: DateTime<Utc>) -> Result<CertificateBundle, CertificateError> {
    let now = ::time::OffsetDateTime::from_unix_timestamp(now.timestamp())
        .map_err(|e| CertificateError::Generation(format!("invalid timestamp: {e}")))?;
    let generated = pki::synthesize_self_signed(dns_names, now)?;
    Ok(CertificateBundle {
        key_pem: generated.key_pem,
        cert_pem: generated.cert_pem,
        provenance: Provenance::OperatorManaged,
    })
}

/// Produces the serving bundle for this pass.
///
/// Returns `Ok(None)` only when issuance is delegated and no certificate
/// has been issued yet.
pub fn resolve_bundle(
    snapshot: &DependencySnapshot,
    config: &ControllerConfig,
    now: DateTime<Utc>,
) -> Result<Option<CertificateBundle>, CertificateError> {
    let dns_names = service_dns_names(&config.cluster_domain);
    let delegation = snapshot.installation.spec.certificate_management.as_ref();

    let Some(existing) = snapshot.manager_tls.as_ref() else {
        if delegation.is_some() {
            debug!("No manager TLS secret yet and issuance is delegated");
            return Ok(None);
        }
        info!("Generating manager TLS certificate");
        return synthesize(&dns_names, now).map(Some);
    };

    let info = &existing.info;
    let keep = |provenance| CertificateBundle {
        key_pem: existing.key_pem.clone(),
        cert_pem: existing.cert_pem.clone(),
        provenance,
    };

    match delegation {
        None if info.is_operator_issued() => {
            if same_names(&info.dns_names, &dns_names) {
                Ok(Some(keep(Provenance::OperatorManaged)))
            } else {
                info!(
                    current = ?info.dns_names,
                    "Manager TLS certificate has stale DNS names, regenerating"
                );
                synthesize(&dns_names, now).map(Some)
            }
        }
        None => Ok(Some(keep(Provenance::UserProvided))),
        Some(_) if info.is_operator_issued() => Ok(Some(keep(Provenance::OperatorManaged))),
        Some(cm) if !cm.signer_name.is_empty() && info.issuer_common_name == cm.signer_name => {
            Ok(Some(keep(Provenance::ExternallyIssued)))
        }
        Some(_) => Err(CertificateError::Untrusted(format!(
            "user provided secret {MANAGER_NAMESPACE}/{MANAGER_TLS_SECRET} is not supported when certificate management is enabled"
        ))),
    }
}

/// Status reason for a certificate failure.
pub fn failure_reason(error: &CertificateError) -> String {
    match error {
        CertificateError::Untrusted(_) => "Invalid certificate configuration".to_string(),
        _ => format!(
            "Error ensuring manager TLS certificate \"{MANAGER_TLS_SECRET}\" exists and has valid DNS names"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ControllerError;
    use crate::pki::parse_certificate;
    use crate::reconciler::dependencies::ManagerTlsSecret;
    use crate::test_utils::{satisfied_snapshot, with_certificate_management};

    fn tls_from(bundle: &CertificateBundle) -> ManagerTlsSecret {
        ManagerTlsSecret {
            key_pem: bundle.key_pem.clone(),
            cert_pem: bundle.cert_pem.clone(),
            info: parse_certificate(&bundle.cert_pem).unwrap(),
        }
    }

    #[test]
    fn test_service_dns_names() {
        assert_eq!(
            service_dns_names("cluster.local"),
            vec![
                "tigera-manager",
                "tigera-manager.tigera-manager",
                "tigera-manager.tigera-manager.svc",
                "tigera-manager.tigera-manager.svc.cluster.local",
                "localhost",
            ]
        );
    }

    #[test]
    fn test_synthesizes_when_absent() {
        let config = ControllerConfig::default();
        let snapshot = satisfied_snapshot();
        let bundle = resolve_bundle(&snapshot, &config, Utc::now()).unwrap().unwrap();

        assert_eq!(bundle.provenance, Provenance::OperatorManaged);
        let info = parse_certificate(&bundle.cert_pem).unwrap();
        assert_eq!(info.dns_names, service_dns_names(&config.cluster_domain));
        assert_eq!(info.not_after - info.not_before, 825 * 24 * 3600);
        assert!(bundle.passthrough("tigera-operator").unwrap().is_some());
    }

    #[test]
    fn test_keeps_current_operator_certificate() {
        let config = ControllerConfig::default();
        let mut snapshot = satisfied_snapshot();
        let first = resolve_bundle(&snapshot, &config, Utc::now()).unwrap().unwrap();
        snapshot.manager_tls = Some(tls_from(&first));

        let second = resolve_bundle(&snapshot, &config, Utc::now()).unwrap().unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn test_regenerates_stale_dns_names() {
        let mut snapshot = satisfied_snapshot();
        let old = resolve_bundle(&snapshot, &ControllerConfig::default(), Utc::now())
            .unwrap()
            .unwrap();
        snapshot.manager_tls = Some(tls_from(&old));

        let config = ControllerConfig {
            cluster_domain: "corp.internal".to_string(),
            ..Default::default()
        };
        let new = resolve_bundle(&snapshot, &config, Utc::now()).unwrap().unwrap();
        assert_ne!(new.cert_pem, old.cert_pem);
        let info = parse_certificate(&new.cert_pem).unwrap();
        assert!(info.dns_names.contains(&"tigera-manager.tigera-manager.svc.corp.internal".to_string()));
    }

    #[test]
    fn test_user_certificate_kept_without_passthrough() {
        let mut snapshot = satisfied_snapshot();
        let bundle = resolve_bundle(&snapshot, &ControllerConfig::default(), Utc::now())
            .unwrap()
            .unwrap();
        let mut tls = tls_from(&bundle);
        tls.info.issuer_common_name = "corp-ca".to_string();
        snapshot.manager_tls = Some(tls);

        let kept = resolve_bundle(&snapshot, &ControllerConfig::default(), Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(kept.provenance, Provenance::UserProvided);
        assert!(kept.passthrough("tigera-operator").unwrap().is_none());
    }

    #[test]
    fn test_delegation_without_secret_yields_nothing() {
        let snapshot = with_certificate_management(satisfied_snapshot(), "example.com/signer");
        assert!(resolve_bundle(&snapshot, &ControllerConfig::default(), Utc::now())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_delegation_attribution() {
        let base = satisfied_snapshot();
        let issued = resolve_bundle(&base, &ControllerConfig::default(), Utc::now())
            .unwrap()
            .unwrap();

        let mut snapshot = with_certificate_management(base, "example.com/signer");
        let mut tls = tls_from(&issued);
        tls.info.issuer_common_name = "example.com/signer".to_string();
        snapshot.manager_tls = Some(tls.clone());
        let external = resolve_bundle(&snapshot, &ControllerConfig::default(), Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(external.provenance, Provenance::ExternallyIssued);

        tls.info.issuer_common_name = "someone-else".to_string();
        snapshot.manager_tls = Some(tls);
        let err = resolve_bundle(&snapshot, &ControllerConfig::default(), Utc::now()).unwrap_err();
        assert!(matches!(err, CertificateError::Untrusted(_)));
        assert_eq!(failure_reason(&err), "Invalid certificate configuration");

        let message = ControllerError::from(err).to_string();
        assert!(message.starts_with("Certificate error: user provided secret"));
        assert_eq!(message.matches("Invalid certificate configuration").count(), 0);
    }
}
