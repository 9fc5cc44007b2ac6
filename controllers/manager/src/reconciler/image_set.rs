//! Digest pinning from a release `ImageSet`.

use crate::error::ControllerError;
use crate::render::RenderedComponent;
use crds::{ImageSet, ProductVariant};
use serde_json::Value;
use tracing::debug;

/// Name of the `ImageSet` for a variant and release.
pub fn image_set_name(variant: ProductVariant, release: &str) -> String {
    format!("{}-{}", variant.image_set_prefix(), release)
}

/// Checks every entry carries a `sha256:` digest.
pub fn validate(image_set: &ImageSet) -> Result<(), ControllerError> {
    for entry in &image_set.spec.images {
        if entry.image.is_empty() {
            return Err(ControllerError::ImageSet(format!(
                "ImageSet {} has an entry without an image",
                image_set.metadata.name.as_deref().unwrap_or_default()
            )));
        }
        if !entry.digest.starts_with("sha256:") {
            return Err(ControllerError::ImageSet(format!(
                "image {} has invalid digest '{}'",
                entry.image, entry.digest
            )));
        }
    }
    Ok(())
}

/// Strips the tag from an image reference, leaving registry and path.
fn repository(image: &str) -> &str {
    let image = image.split_once('@').map_or(image, |(repo, _)| repo);
    match image.rfind(':') {
        Some(colon) if !image[colon..].contains('/') => &image[..colon],
        _ => image,
    }
}

/// Whether `repo` is `entry` under some registry prefix.
fn matches_entry(repo: &str, entry: &str) -> bool {
    repo.strip_suffix(entry)
        .is_some_and(|prefix| prefix.is_empty() || prefix.ends_with('/'))
}

fn pin(image: &str, image_set: &ImageSet) -> Result<String, ControllerError> {
    let repo = repository(image);
    image_set
        .spec
        .images
        .iter()
        .find(|entry| matches_entry(repo, entry.image.trim_matches('/')))
        .map(|entry| format!("{repo}@{}", entry.digest))
        .ok_or_else(|| {
            ControllerError::ImageSet(format!(
                "ImageSet {} has no entry for image {image}",
                image_set.metadata.name.as_deref().unwrap_or_default()
            ))
        })
}

/// Rewrites every container image in the component's workloads to its
/// pinned digest.
pub fn apply_image_set(component: &mut RenderedComponent, image_set: &ImageSet) -> Result<(), ControllerError> {
    validate(image_set)?;

    for object in &mut component.objects_to_create {
        let Some(pod) = object.body.pointer_mut("/spec/template/spec") else {
            continue;
        };
        for list in ["initContainers", "containers"] {
            let Some(containers) = pod.get_mut(list).and_then(Value::as_array_mut) else {
                continue;
            };
            for container in containers {
                let Some(image) = container.get("image").and_then(Value::as_str) else {
                    continue;
                };
                let pinned = pin(image, image_set)?;
                debug!(from = image, to = %pinned, "Pinning image");
                container["image"] = Value::String(pinned);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster_client::ManagedObject;
    use crds::{ImageDigest, ImageSetSpec};
    use serde_json::json;

    fn image_set(entries: &[(&str, &str)]) -> ImageSet {
        ImageSet::new(
            "enterprise-v3.0.0",
            ImageSetSpec {
                images: entries
                    .iter()
                    .map(|(image, digest)| ImageDigest {
                        image: image.to_string(),
                        digest: digest.to_string(),
                    })
                    .collect(),
            },
        )
    }

    fn component(images: &[&str]) -> RenderedComponent {
        let containers: Vec<_> = images
            .iter()
            .map(|image| json!({"name": "c", "image": image}))
            .collect();
        let deployment = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "tigera-manager", "namespace": "tigera-manager"},
            "spec": {"template": {"spec": {"containers": containers}}},
        });
        RenderedComponent {
            objects_to_create: vec![ManagedObject::from_value(deployment).unwrap()],
            objects_to_delete: Vec::new(),
        }
    }

    fn images(component: &RenderedComponent) -> Vec<String> {
        component.objects_to_create[0].body["spec"]["template"]["spec"]["containers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["image"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_repository_strips_tag_only() {
        assert_eq!(repository("quay.io/tigera/voltron:v3.0.0"), "quay.io/tigera/voltron");
        assert_eq!(repository("localhost:5000/tigera/voltron"), "localhost:5000/tigera/voltron");
        assert_eq!(repository("quay.io/tigera/voltron@sha256:abc"), "quay.io/tigera/voltron");
    }

    #[test]
    fn test_images_are_pinned() {
        let mut component = component(&["quay.io/tigera/cnx-manager:v3.0.0", "quay.io/tigera/voltron:v3.0.0"]);
        let set = image_set(&[
            ("tigera/cnx-manager", "sha256:aaa"),
            ("tigera/voltron", "sha256:bbb"),
        ]);
        apply_image_set(&mut component, &set).unwrap();
        assert_eq!(
            images(&component),
            vec![
                "quay.io/tigera/cnx-manager@sha256:aaa",
                "quay.io/tigera/voltron@sha256:bbb",
            ]
        );
    }

    #[test]
    fn test_missing_entry_is_an_error() {
        let mut component = component(&["quay.io/tigera/es-proxy:v3.0.0"]);
        let set = image_set(&[("tigera/cnx-manager", "sha256:aaa")]);
        assert!(matches!(
            apply_image_set(&mut component, &set),
            Err(ControllerError::ImageSet(_))
        ));
    }

    #[test]
    fn test_entries_match_whole_path_segments() {
        assert!(matches_entry("quay.io/tigera/voltron", "tigera/voltron"));
        assert!(matches_entry("tigera/voltron", "tigera/voltron"));
        assert!(!matches_entry("quay.io/tigera/voltron", "gera/voltron"));

        let mut component = component(&["registry.example.com/mirror/voltron:v3.0.0"]);
        let set = image_set(&[("tigera/voltron", "sha256:bbb")]);
        assert!(apply_image_set(&mut component, &set).is_err());
    }

    #[test]
    fn test_invalid_digest_is_rejected() {
        let set = image_set(&[("tigera/cnx-manager", "md5:aaa")]);
        assert!(validate(&set).is_err());
    }

    #[test]
    fn test_image_set_name() {
        assert_eq!(
            image_set_name(ProductVariant::TigeraSecureEnterprise, "v3.0.0"),
            "enterprise-v3.0.0"
        );
    }
}
