use super::{labels, MANAGER_PORT, TUNNEL_PORT};
use crate::names::*;
use crate::reconciler::assembler::ConfigurationSnapshot;
use crate::reconciler::dependencies::ClusterRole;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, EnvVarSource, LocalObjectReference, PodSpec, PodTemplateSpec,
    SecretKeySelector, SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

/// Container names and the images they run.
pub const CONTAINER_IMAGES: [(&str, &str); 3] = [
    ("tigera-manager", "cnx-manager"),
    ("tigera-es-proxy", "es-proxy"),
    ("tigera-voltron", "voltron"),
];

const DEFAULT_IMAGE_PATH: &str = "tigera";

/// Full image reference for `image` at the configured registry and release.
pub fn image_reference(config: &ConfigurationSnapshot, image: &str) -> String {
    let path = config.image_path.as_deref().unwrap_or(DEFAULT_IMAGE_PATH);
    format!("{}{}/{}:{}", config.registry, path.trim_matches('/'), image, config.release)
}

fn env(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

fn env_from_secret(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                optional: None,
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn flag(value: bool) -> String {
    value.to_string()
}

fn secret_volume(name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(name.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        read_only: Some(true),
        ..Default::default()
    }
}

fn image_name(container: &str) -> &'static str {
    CONTAINER_IMAGES
        .iter()
        .find(|(c, _)| *c == container)
        .map_or("", |(_, image)| image)
}

fn manager_container(config: &ConfigurationSnapshot) -> Container {
    let multi_cluster = config.role.is_multi_cluster();
    let mut env_vars = vec![
        env("ENABLE_MULTI_CLUSTER_MANAGEMENT", flag(multi_cluster)),
        env("ENABLE_COMPLIANCE_REPORTS", flag(config.compliance_enabled)),
        env("CNX_CLUSTER_NAME", config.es_cluster_config.cluster_name.clone()),
    ];
    match &config.key_validator {
        Some(validator) => {
            env_vars.push(env("CNX_WEB_AUTHENTICATION_TYPE", "OIDC"));
            env_vars.push(env("CNX_WEB_OIDC_AUTHORITY", validator.issuer.clone()));
            env_vars.push(env("CNX_WEB_OIDC_CLIENT_ID", validator.client_id.clone()));
        }
        None => env_vars.push(env("CNX_WEB_AUTHENTICATION_TYPE", crds::SUPPORTED_AUTH_TYPE)),
    }

    Container {
        name: "tigera-manager".to_string(),
        image: Some(image_reference(config, image_name("tigera-manager"))),
        env: Some(env_vars),
        ..Default::default()
    }
}

fn es_proxy_container(config: &ConfigurationSnapshot) -> Container {
    let es = &config.es_cluster_config;
    let mut env_vars = vec![
        env("ELASTIC_INDEX_SUFFIX", es.cluster_name.clone()),
        env("ELASTIC_LICENSE_TYPE", config.es_license.as_str()),
        env_from_secret("ELASTIC_USERNAME", ES_MANAGER_USER_SECRET, "username"),
        env_from_secret("ELASTIC_PASSWORD", ES_MANAGER_USER_SECRET, "password"),
        env("ELASTIC_CA", format!("/certs/elasticsearch/{TLS_CERT_FIELD}")),
    ];
    if let Some(validator) = &config.key_validator {
        env_vars.push(env("OIDC_AUTH_ISSUER", validator.issuer.clone()));
        env_vars.push(env("OIDC_AUTH_CLIENT_ID", validator.client_id.clone()));
        env_vars.push(env("OIDC_AUTH_USERNAME_CLAIM", validator.username_claim.clone()));
        if let Some(groups) = &validator.groups_claim {
            env_vars.push(env("OIDC_AUTH_GROUPS_CLAIM", groups.clone()));
        }
        if let Some(prefix) = &validator.username_prefix {
            env_vars.push(env("OIDC_AUTH_USERNAME_PREFIX", prefix.clone()));
        }
        if let Some(prefix) = &validator.groups_prefix {
            env_vars.push(env("OIDC_AUTH_GROUPS_PREFIX", prefix.clone()));
        }
    }

    Container {
        name: "tigera-es-proxy".to_string(),
        image: Some(image_reference(config, image_name("tigera-es-proxy"))),
        env: Some(env_vars),
        volume_mounts: Some(vec![mount(ES_PUBLIC_CERT_SECRET, "/certs/elasticsearch")]),
        ..Default::default()
    }
}

fn voltron_container(config: &ConfigurationSnapshot) -> Container {
    let hub = config.role == ClusterRole::Hub;
    let mut env_vars = vec![
        env("VOLTRON_PORT", MANAGER_PORT.to_string()),
        env("VOLTRON_ENABLE_MULTI_CLUSTER_MANAGEMENT", flag(hub)),
        env("VOLTRON_ENABLE_COMPLIANCE", flag(config.compliance_enabled)),
        env(
            "VOLTRON_ELASTIC_ENDPOINT",
            format!("https://tigera-secure-es-http.tigera-elasticsearch.svc.{}:9200", config.cluster_domain),
        ),
    ];
    let mut mounts = vec![
        mount(KIBANA_PUBLIC_CERT_SECRET, "/certs/kibana"),
        mount(PACKET_CAPTURE_CERT_SECRET, "/certs/packetcapture"),
    ];
    if config.tls.is_some() {
        env_vars.push(env("VOLTRON_HTTPS_CERT", format!("/certs/https/{MANAGER_TLS_CERT_FIELD}")));
        env_vars.push(env("VOLTRON_HTTPS_KEY", format!("/certs/https/{MANAGER_TLS_KEY_FIELD}")));
        mounts.push(mount(MANAGER_TLS_SECRET, "/certs/https"));
    }
    if config.compliance_enabled && config.compliance_cert.is_some() {
        mounts.push(mount(COMPLIANCE_SERVER_CERT_SECRET, "/certs/compliance"));
    }
    if config.prometheus_cert.is_some() {
        mounts.push(mount(PROMETHEUS_TLS_SECRET, "/certs/prometheus"));
    }
    if hub {
        env_vars.push(env("VOLTRON_TUNNEL_PORT", TUNNEL_PORT.to_string()));
        mounts.push(mount(TUNNEL_SECRET, "/certs/tunnel"));
        mounts.push(mount(INTERNAL_MANAGER_TLS_SECRET, "/certs/internal"));
    }

    let mut ports = vec![ContainerPort {
        name: Some("https".to_string()),
        container_port: MANAGER_PORT,
        ..Default::default()
    }];
    if hub {
        ports.push(ContainerPort {
            name: Some("tunnel".to_string()),
            container_port: TUNNEL_PORT,
            ..Default::default()
        });
    }

    Container {
        name: "tigera-voltron".to_string(),
        image: Some(image_reference(config, image_name("tigera-voltron"))),
        env: Some(env_vars),
        ports: Some(ports),
        volume_mounts: Some(mounts),
        ..Default::default()
    }
}

fn volumes(config: &ConfigurationSnapshot) -> Vec<Volume> {
    let mut names = vec![ES_PUBLIC_CERT_SECRET, KIBANA_PUBLIC_CERT_SECRET, PACKET_CAPTURE_CERT_SECRET];
    if config.tls.is_some() {
        names.push(MANAGER_TLS_SECRET);
    }
    if config.compliance_enabled && config.compliance_cert.is_some() {
        names.push(COMPLIANCE_SERVER_CERT_SECRET);
    }
    if config.prometheus_cert.is_some() {
        names.push(PROMETHEUS_TLS_SECRET);
    }
    if config.role == ClusterRole::Hub {
        names.extend([TUNNEL_SECRET, INTERNAL_MANAGER_TLS_SECRET]);
    }
    names.into_iter().map(secret_volume).collect()
}

/// The Manager deployment: UI, search-index proxy and the gateway.
pub fn manager_deployment(config: &ConfigurationSnapshot) -> Deployment {
    let pull_secrets: Vec<LocalObjectReference> = config
        .pull_secrets
        .iter()
        .filter_map(|s| s.metadata.name.clone())
        .map(|name| LocalObjectReference { name })
        .collect();

    let mut node_selector = BTreeMap::new();
    node_selector.insert("kubernetes.io/os".to_string(), "linux".to_string());

    Deployment {
        metadata: ObjectMeta {
            name: Some(MANAGER_NAME.to_string()),
            namespace: Some(MANAGER_NAMESPACE.to_string()),
            labels: Some(labels()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(config.replicas),
            selector: LabelSelector {
                match_labels: Some(labels()),
                ..Default::default()
            },
            strategy: Some(DeploymentStrategy {
                type_: Some("Recreate".to_string()),
                ..Default::default()
            }),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    name: Some(MANAGER_NAME.to_string()),
                    labels: Some(labels()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(MANAGER_NAME.to_string()),
                    node_selector: Some(node_selector),
                    image_pull_secrets: (!pull_secrets.is_empty()).then_some(pull_secrets),
                    containers: vec![
                        manager_container(config),
                        es_proxy_container(config),
                        voltron_container(config),
                    ],
                    volumes: Some(volumes(config)),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::reconciler::assembler::assemble;
    use crate::test_utils::satisfied_snapshot;

    fn env_value(container: &Container, name: &str) -> Option<String> {
        container
            .env
            .iter()
            .flatten()
            .find(|e| e.name == name)
            .and_then(|e| e.value.clone())
    }

    #[test]
    fn test_images_follow_registry_and_release() {
        let mut deps = satisfied_snapshot();
        deps.installation.spec.registry = Some("registry.example.com/".to_string());
        deps.installation.spec.image_path = Some("mirror".to_string());
        let config = assemble(&deps, None, &ControllerConfig::default());

        let deployment = manager_deployment(&config);
        let pod = deployment.spec.unwrap().template.spec.unwrap();
        let images: Vec<_> = pod.containers.iter().filter_map(|c| c.image.clone()).collect();
        assert_eq!(
            images,
            vec![
                "registry.example.com/mirror/cnx-manager:v3.0.0",
                "registry.example.com/mirror/es-proxy:v3.0.0",
                "registry.example.com/mirror/voltron:v3.0.0",
            ]
        );
    }

    #[test]
    fn test_voltron_hub_settings() {
        let mut deps = satisfied_snapshot();
        deps.role = ClusterRole::Hub;
        let config = assemble(&deps, None, &ControllerConfig::default());
        let deployment = manager_deployment(&config);
        let spec = deployment.spec.unwrap();
        assert_eq!(spec.replicas, Some(1));

        let pod = spec.template.spec.unwrap();
        let voltron = &pod.containers[2];
        assert_eq!(env_value(voltron, "VOLTRON_ENABLE_MULTI_CLUSTER_MANAGEMENT").as_deref(), Some("true"));
        assert_eq!(env_value(voltron, "VOLTRON_TUNNEL_PORT").as_deref(), Some("9449"));
        assert!(pod
            .volumes
            .unwrap()
            .iter()
            .any(|v| v.name == TUNNEL_SECRET));
    }

    #[test]
    fn test_token_auth_without_authentication() {
        let config = assemble(&satisfied_snapshot(), None, &ControllerConfig::default());
        let pod = manager_deployment(&config).spec.unwrap().template.spec.unwrap();
        assert_eq!(
            env_value(&pod.containers[0], "CNX_WEB_AUTHENTICATION_TYPE").as_deref(),
            Some("Token")
        );
    }
}
