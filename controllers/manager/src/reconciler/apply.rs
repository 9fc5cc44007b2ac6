//! Idempotent apply engine.
//!
//! Components are applied in order. Within a component every desired
//! object is created if missing, left alone when the live object already
//! carries every desired field, and merged into the live object otherwise;
//! deletions follow. The first error
//! stops the run and nothing already applied is rolled back.

use crate::error::ControllerError;
use crate::render::RenderedComponent;
use cluster_client::{ClusterStore, ManagedObject, ObjectKey};
use crds::Manager;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

/// A unit of desired state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Component {
    /// A single object re-applied verbatim
    Passthrough(ManagedObject),
    /// Output of a renderer
    Rendered(RenderedComponent),
}

impl Component {
    fn objects(&self) -> (Vec<&ManagedObject>, &[ObjectKey]) {
        match self {
            Component::Passthrough(object) => (vec![object], &[]),
            Component::Rendered(rendered) => (
                rendered.objects_to_create.iter().collect(),
                &rendered.objects_to_delete,
            ),
        }
    }
}

/// Ordered components for one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DesiredObjectSet {
    pub components: Vec<Component>,
}

/// What an apply run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub created: Vec<ObjectKey>,
    pub updated: Vec<ObjectKey>,
    pub unchanged: Vec<ObjectKey>,
    pub deleted: Vec<ObjectKey>,
    /// Deployments the run created, updated or found converged
    pub workloads: Vec<ObjectKey>,
}

impl ApplyReport {
    /// Number of mutating calls made.
    pub fn mutations(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }
}

/// Merges `desired` into `live`. Objects merge key by key; arrays and
/// scalars from `desired` replace what is live.
pub fn merge_into(live: &mut Value, desired: &Value) {
    match (live, desired) {
        (Value::Object(live), Value::Object(desired)) => {
            for (key, value) in desired {
                match live.get_mut(key) {
                    Some(existing) => merge_into(existing, value),
                    None => {
                        live.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (live, desired) => *live = desired.clone(),
    }
}

/// Whether `live` already carries everything in `desired`. Objects may hold
/// extra keys such as server-side defaults; arrays must match element by
/// element.
pub fn is_subset(desired: &Value, live: &Value) -> bool {
    match (desired, live) {
        (Value::Object(desired), Value::Object(live)) => desired.iter().all(|(key, value)| match live.get(key) {
            Some(existing) => is_subset(value, existing),
            None => value.is_null(),
        }),
        (Value::Array(desired), Value::Array(live)) => {
            desired.len() == live.len() && desired.iter().zip(live).all(|(d, l)| is_subset(d, l))
        }
        (desired, live) => desired == live,
    }
}

/// Whether `live` reports every desired replica as available.
pub fn workload_available(live: &Value) -> bool {
    let desired = live.pointer("/spec/replicas").and_then(Value::as_i64).unwrap_or(1);
    let available = live
        .pointer("/status/availableReplicas")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    available >= desired
}

/// Applies desired objects through a [`ClusterStore`].
pub struct ApplyEngine<'a> {
    store: &'a dyn ClusterStore,
    owner: Option<OwnerReference>,
}

impl std::fmt::Debug for ApplyEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplyEngine").field("owner", &self.owner).finish_non_exhaustive()
    }
}

impl<'a> ApplyEngine<'a> {
    pub fn new(store: &'a dyn ClusterStore) -> Self {
        Self { store, owner: None }
    }

    /// Marks namespaced objects as controlled by `manager`.
    #[must_use]
    pub fn owned_by(mut self, manager: &Manager) -> Self {
        self.owner = manager.controller_owner_ref(&());
        self
    }

    fn with_owner(&self, object: &ManagedObject) -> ManagedObject {
        let mut object = object.clone();
        if let (Some(owner), Some(_)) = (&self.owner, &object.key.namespace) {
            if let Ok(owner) = serde_json::to_value(owner) {
                object.body["metadata"]["ownerReferences"] = Value::Array(vec![owner]);
            }
        }
        object
    }

    /// Applies every component in order, stopping at the first failure.
    pub async fn apply(&self, desired: &DesiredObjectSet) -> Result<ApplyReport, ControllerError> {
        let mut report = ApplyReport::default();
        for component in &desired.components {
            self.apply_component(component, &mut report).await?;
        }
        info!(
            created = report.created.len(),
            updated = report.updated.len(),
            deleted = report.deleted.len(),
            unchanged = report.unchanged.len(),
            "Applied desired objects"
        );
        Ok(report)
    }

    async fn apply_component(&self, component: &Component, report: &mut ApplyReport) -> Result<(), ControllerError> {
        let (objects, deletions) = component.objects();

        for object in objects {
            let object = self.with_owner(object);
            let key = object.key.clone();
            let fail = |source| ControllerError::Apply {
                object: key.clone(),
                source,
            };

            match self.store.get_object(&key).await.map_err(fail)? {
                None => {
                    debug!(object = %key, "Creating");
                    self.store.create_object(&object).await.map_err(fail)?;
                    report.created.push(key.clone());
                }
                Some(live) => {
                    if is_subset(&object.body, &live) {
                        report.unchanged.push(key.clone());
                    } else {
                        debug!(object = %key, "Updating");
                        let mut merged = live;
                        merge_into(&mut merged, &object.body);
                        let merged = ManagedObject {
                            key: key.clone(),
                            body: merged,
                        };
                        self.store.replace_object(&merged).await.map_err(fail)?;
                        report.updated.push(key.clone());
                    }
                }
            }

            if key.kind == "Deployment" {
                report.workloads.push(key);
            }
        }

        for key in deletions {
            let deleted = self.store.delete_object(key).await.map_err(|source| ControllerError::Apply {
                object: key.clone(),
                source,
            })?;
            if deleted {
                debug!(object = %key, "Deleted");
                report.deleted.push(key.clone());
            }
        }
        Ok(())
    }

    /// Whether every workload in `report` is fully available.
    pub async fn workloads_available(&self, report: &ApplyReport) -> Result<bool, ControllerError> {
        for key in &report.workloads {
            match self.store.get_object(key).await? {
                Some(live) if workload_available(&live) => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster_client::{MockClusterStore, Mutation};
    use serde_json::json;

    fn config_map(name: &str, data: Value) -> ManagedObject {
        ManagedObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": name, "namespace": "tigera-manager"},
            "data": data,
        }))
        .unwrap()
    }

    fn rendered(objects: Vec<ManagedObject>) -> DesiredObjectSet {
        DesiredObjectSet {
            components: vec![Component::Rendered(RenderedComponent {
                objects_to_create: objects,
                objects_to_delete: Vec::new(),
            })],
        }
    }

    #[test]
    fn test_merge_preserves_foreign_fields() {
        let mut live = json!({
            "metadata": {"name": "a", "resourceVersion": "7", "annotations": {"x": "1"}},
            "data": {"a": "1", "b": "2"},
            "list": [1, 2, 3],
        });
        merge_into(&mut live, &json!({"metadata": {"name": "a"}, "data": {"a": "9"}, "list": [4]}));
        assert_eq!(
            live,
            json!({
                "metadata": {"name": "a", "resourceVersion": "7", "annotations": {"x": "1"}},
                "data": {"a": "9", "b": "2"},
                "list": [4],
            })
        );
    }

    #[test]
    fn test_subset_allows_server_defaults() {
        let desired = json!({"spec": {"containers": [{"name": "a", "image": "x"}]}});
        let defaulted = json!({
            "spec": {
                "containers": [{"name": "a", "image": "x", "imagePullPolicy": "IfNotPresent"}],
                "dnsPolicy": "ClusterFirst",
            },
        });
        assert!(is_subset(&desired, &defaulted));
        assert!(!is_subset(&desired, &json!({"spec": {"containers": [{"name": "a", "image": "y"}]}})));
        assert!(!is_subset(&desired, &json!({"spec": {"containers": []}})));
        assert!(is_subset(&json!({"a": null}), &json!({})));
    }

    #[tokio::test]
    async fn test_server_defaults_do_not_cause_updates() {
        let store = MockClusterStore::new();
        let engine = ApplyEngine::new(&store);
        let desired = rendered(vec![ManagedObject::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web", "namespace": "tigera-manager"},
            "spec": {"template": {"spec": {"containers": [{"name": "web", "image": "nginx"}]}}},
        }))
        .unwrap()]);
        engine.apply(&desired).await.unwrap();

        let key = ObjectKey::new("apps/v1", "Deployment", Some("tigera-manager"), "web");
        let mut live = store.object(&key).unwrap();
        let container = &mut live["spec"]["template"]["spec"]["containers"][0];
        container["imagePullPolicy"] = json!("IfNotPresent");
        container["terminationMessagePath"] = json!("/dev/termination-log");
        live["spec"]["progressDeadlineSeconds"] = json!(600);
        store.add_value(live);
        store.clear_mutations();

        for _ in 0..2 {
            let report = engine.apply(&desired).await.unwrap();
            assert_eq!(report.unchanged, vec![key.clone()]);
        }
        assert!(store.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_second_apply_is_a_no_op() {
        let store = MockClusterStore::new();
        let engine = ApplyEngine::new(&store);
        let desired = rendered(vec![config_map("one", json!({"a": "1"}))]);

        let first = engine.apply(&desired).await.unwrap();
        assert_eq!(first.created.len(), 1);

        store.clear_mutations();
        let second = engine.apply(&desired).await.unwrap();
        assert_eq!(second.mutations(), 0);
        assert_eq!(second.unchanged.len(), 1);
        assert!(store.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_drift_is_corrected() {
        let store = MockClusterStore::new();
        let engine = ApplyEngine::new(&store);
        engine.apply(&rendered(vec![config_map("one", json!({"a": "1"}))])).await.unwrap();

        let report = engine
            .apply(&rendered(vec![config_map("one", json!({"a": "2"}))]))
            .await
            .unwrap();
        assert_eq!(report.updated.len(), 1);
        let key = ObjectKey::new("v1", "ConfigMap", Some("tigera-manager"), "one");
        assert_eq!(store.object(&key).unwrap()["data"]["a"], "2");
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let store = MockClusterStore::new();
        let engine = ApplyEngine::new(&store);
        let first = config_map("first", json!({}));
        let second = config_map("second", json!({}));
        store.fail_writes(second.key.clone());

        let desired = DesiredObjectSet {
            components: vec![
                Component::Passthrough(first.clone()),
                Component::Rendered(RenderedComponent {
                    objects_to_create: vec![second.clone()],
                    objects_to_delete: Vec::new(),
                }),
            ],
        };
        let err = engine.apply(&desired).await.unwrap_err();
        assert!(matches!(err, ControllerError::Apply { ref object, .. } if *object == second.key));
        assert_eq!(store.mutations(), vec![Mutation::Create(first.key)]);
    }

    #[tokio::test]
    async fn test_deletes_only_existing_objects() {
        let store = MockClusterStore::new();
        let existing = config_map("stale", json!({}));
        store.add_value(existing.body.clone());
        let missing = ObjectKey::new("v1", "ConfigMap", Some("tigera-manager"), "gone");

        let desired = DesiredObjectSet {
            components: vec![Component::Rendered(RenderedComponent {
                objects_to_create: Vec::new(),
                objects_to_delete: vec![existing.key.clone(), missing],
            })],
        };
        let report = ApplyEngine::new(&store).apply(&desired).await.unwrap();
        assert_eq!(report.deleted, vec![existing.key]);
    }

    #[test]
    fn test_workload_availability() {
        assert!(workload_available(&json!({"spec": {"replicas": 2}, "status": {"availableReplicas": 2}})));
        assert!(!workload_available(&json!({"spec": {"replicas": 2}, "status": {"availableReplicas": 1}})));
        assert!(!workload_available(&json!({"spec": {"replicas": 1}})));
    }
}
