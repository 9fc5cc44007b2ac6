//! Rendering of the Manager component.
//!
//! A [`Renderer`] turns a [`ConfigurationSnapshot`] into the objects that
//! should exist and the objects that should not. It performs no I/O.

mod deployment;

use crate::error::ControllerError;
use crate::names::*;
use crate::reconciler::assembler::ConfigurationSnapshot;
use crate::reconciler::dependencies::ClusterRole;
use cluster_client::{ManagedObject, ObjectKey};
use k8s_openapi::api::core::v1::{Namespace, Secret, Service, ServiceAccount, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::ByteString;
use kube::Resource;
use serde::Serialize;
use std::collections::BTreeMap;

pub use deployment::manager_deployment;

/// Port the Manager service listens on.
pub const MANAGER_PORT: i32 = 9443;

/// Port the hub tunnel listens on.
pub const TUNNEL_PORT: i32 = 9449;

/// Objects produced for one component.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderedComponent {
    /// Objects to create or update, in apply order
    pub objects_to_create: Vec<ManagedObject>,
    /// Objects to delete if present
    pub objects_to_delete: Vec<ObjectKey>,
}

/// Produces the desired Manager objects.
pub trait Renderer: Send + Sync {
    fn render(&self, config: &ConfigurationSnapshot) -> Result<RenderedComponent, ControllerError>;
}

/// The built-in Manager renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManagerRenderer;

pub(crate) fn labels() -> BTreeMap<String, String> {
    BTreeMap::from([("k8s-app".to_string(), MANAGER_NAME.to_string())])
}

fn to_object<K>(resource: &K) -> Result<ManagedObject, ControllerError>
where
    K: Resource<DynamicType = ()> + Serialize,
{
    ManagedObject::from_resource(resource).map_err(|e| ControllerError::Render(e.to_string()))
}

/// Copies `source` into the Manager namespace, folding `stringData`
/// into `data`.
pub fn copy_secret(source: &Secret, namespace: &str) -> Secret {
    let mut data = source.data.clone().unwrap_or_default();
    for (key, value) in source.string_data.iter().flatten() {
        data.insert(key.clone(), ByteString(value.clone().into_bytes()));
    }
    Secret {
        metadata: ObjectMeta {
            name: source.metadata.name.clone(),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        type_: source.type_.clone(),
        data: Some(data),
        ..Default::default()
    }
}

fn secret_key(name: &str) -> ObjectKey {
    ObjectKey::of::<Secret>(Some(MANAGER_NAMESPACE), name)
}

fn namespace() -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(MANAGER_NAMESPACE.to_string()),
            labels: Some(BTreeMap::from([("name".to_string(), MANAGER_NAMESPACE.to_string())])),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn service_account() -> ServiceAccount {
    ServiceAccount {
        metadata: ObjectMeta {
            name: Some(MANAGER_NAME.to_string()),
            namespace: Some(MANAGER_NAMESPACE.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn service() -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(MANAGER_NAME.to_string()),
            namespace: Some(MANAGER_NAMESPACE.to_string()),
            labels: Some(labels()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(labels()),
            ports: Some(vec![ServicePort {
                name: Some("https".to_string()),
                port: MANAGER_PORT,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::Int(MANAGER_PORT)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

impl ManagerRenderer {
    /// Secrets the Manager pods mount, copied from the operator namespace.
    fn secret_copies(config: &ConfigurationSnapshot) -> Vec<Secret> {
        let mut copies: Vec<Secret> = Vec::new();
        if let Some(tls) = &config.tls {
            copies.push(tls.to_secret(MANAGER_NAMESPACE));
        }
        let sources = config
            .pull_secrets
            .iter()
            .chain([
                &config.es_credentials.user_secret,
                &config.es_credentials.public_cert,
                &config.kibana_cert,
                &config.packet_capture_cert,
            ])
            .chain(config.compliance_cert.iter().filter(|_| config.compliance_enabled))
            .chain(config.prometheus_cert.iter());
        copies.extend(sources.map(|s| copy_secret(s, MANAGER_NAMESPACE)));

        if config.role == ClusterRole::Hub {
            let hub = config.tunnel_secret.iter().chain(config.internal_traffic_secret.iter());
            copies.extend(hub.map(|s| copy_secret(s, MANAGER_NAMESPACE)));
        }
        copies
    }

    fn stale_objects(config: &ConfigurationSnapshot) -> Vec<ObjectKey> {
        let mut stale = Vec::new();
        if config.role != ClusterRole::Hub {
            stale.push(secret_key(TUNNEL_SECRET));
            stale.push(secret_key(INTERNAL_MANAGER_TLS_SECRET));
        }
        if !config.compliance_enabled {
            stale.push(secret_key(COMPLIANCE_SERVER_CERT_SECRET));
        }
        if config.prometheus_cert.is_none() {
            stale.push(secret_key(PROMETHEUS_TLS_SECRET));
        }
        stale
    }
}

impl Renderer for ManagerRenderer {
    fn render(&self, config: &ConfigurationSnapshot) -> Result<RenderedComponent, ControllerError> {
        let mut objects = vec![to_object(&namespace())?, to_object(&service_account())?];
        for secret in Self::secret_copies(config) {
            objects.push(to_object(&secret)?);
        }
        objects.push(to_object(&manager_deployment(config))?);
        objects.push(to_object(&service())?);

        Ok(RenderedComponent {
            objects_to_create: objects,
            objects_to_delete: Self::stale_objects(config),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::reconciler::assembler::assemble;
    use crate::test_utils::{satisfied_snapshot, secret_with};

    fn render(config: &ConfigurationSnapshot) -> RenderedComponent {
        ManagerRenderer.render(config).unwrap()
    }

    fn names(component: &RenderedComponent) -> Vec<String> {
        component
            .objects_to_create
            .iter()
            .map(|o| o.key.to_string())
            .collect()
    }

    #[test]
    fn test_standalone_render() {
        let config = assemble(&satisfied_snapshot(), None, &ControllerConfig::default());
        let component = render(&config);
        let names = names(&component);

        assert_eq!(names.first().map(String::as_str), Some("Namespace tigera-manager"));
        assert!(names.contains(&"Deployment tigera-manager/tigera-manager".to_string()));
        assert!(names.contains(&"Service tigera-manager/tigera-manager".to_string()));
        assert!(names.contains(&format!("Secret tigera-manager/{ES_MANAGER_USER_SECRET}")));
        assert!(!names.contains(&format!("Secret tigera-manager/{TUNNEL_SECRET}")));
        assert!(component.objects_to_delete.contains(&secret_key(TUNNEL_SECRET)));
        assert!(component
            .objects_to_delete
            .contains(&secret_key(COMPLIANCE_SERVER_CERT_SECRET)));
    }

    #[test]
    fn test_hub_copies_tunnel_secrets() {
        let mut deps = satisfied_snapshot();
        deps.role = ClusterRole::Hub;
        deps.tunnel_secret = Some(secret_with(TUNNEL_SECRET, &[("cert", "c"), ("key", "k")]));
        deps.internal_traffic_secret =
            Some(secret_with(INTERNAL_MANAGER_TLS_SECRET, &[("cert", "c"), ("key", "k")]));
        let component = render(&assemble(&deps, None, &ControllerConfig::default()));

        let names = names(&component);
        assert!(names.contains(&format!("Secret tigera-manager/{TUNNEL_SECRET}")));
        assert!(names.contains(&format!("Secret tigera-manager/{INTERNAL_MANAGER_TLS_SECRET}")));
        assert!(!component.objects_to_delete.contains(&secret_key(TUNNEL_SECRET)));
    }

    #[test]
    fn test_copy_secret_folds_string_data() {
        let mut source = secret_with("creds", &[("username", "elastic")]);
        source.string_data = Some(BTreeMap::from([("password".to_string(), "pw".to_string())]));
        let copy = copy_secret(&source, MANAGER_NAMESPACE);

        let data = copy.data.unwrap();
        assert_eq!(data["password"].0, b"pw");
        assert_eq!(data["username"].0, b"elastic");
        assert_eq!(copy.metadata.namespace.as_deref(), Some(MANAGER_NAMESPACE));
        assert!(copy.string_data.is_none());
    }

    #[test]
    fn test_render_is_deterministic() {
        let config = assemble(&satisfied_snapshot(), None, &ControllerConfig::default());
        assert_eq!(render(&config), render(&config));
    }
}
