//! Mock ClusterStore for unit testing
//!
//! Keeps every object as a JSON document in one ordered map so typed reads
//! and untyped apply-engine writes observe the same state. Writes are
//! recorded, and reads or writes of individual objects can be made to fail.

use crate::error::StoreError;
use crate::object::{ManagedObject, ObjectKey};
use crate::store_trait::ClusterStore;
use crds::{
    APIServer, Authentication, Compliance, ImageSet, Installation, LicenseKey, Manager,
    ManagerStatus, ManagementCluster, ManagementClusterConnection,
};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

/// A write performed through the apply-engine methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create(ObjectKey),
    Replace(ObjectKey),
    Delete(ObjectKey),
}

/// Mock ClusterStore for testing
#[derive(Debug, Clone, Default)]
pub struct MockClusterStore {
    objects: Arc<Mutex<BTreeMap<ObjectKey, Value>>>,
    mutations: Arc<Mutex<Vec<Mutation>>>,
    status_patches: Arc<Mutex<Vec<ManagerStatus>>>,
    read_failures: Arc<Mutex<HashSet<ObjectKey>>>,
    write_failures: Arc<Mutex<HashSet<ObjectKey>>>,
    license_api: Arc<Mutex<bool>>,
    next_version: Arc<Mutex<u64>>,
}

impl MockClusterStore {
    /// Create an empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or overwrite a typed object (for test setup)
    pub fn add<K>(&self, resource: &K)
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let object = ManagedObject::from_resource(resource).unwrap();
        self.objects.lock().unwrap().insert(object.key, object.body);
    }

    /// Add or overwrite an untyped object (for test setup)
    pub fn add_value(&self, body: Value) {
        let object = ManagedObject::from_value(body).unwrap();
        self.objects.lock().unwrap().insert(object.key, object.body);
    }

    /// Remove an object without recording a mutation (for test setup)
    pub fn remove(&self, key: &ObjectKey) {
        self.objects.lock().unwrap().remove(key);
    }

    /// Raw stored document
    pub fn object(&self, key: &ObjectKey) -> Option<Value> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// Stored document decoded as `K`
    pub fn typed<K>(&self, namespace: Option<&str>, name: &str) -> Option<K>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        self.object(&ObjectKey::of::<K>(namespace, name))
            .map(|body| serde_json::from_value(body).unwrap())
    }

    /// Every stored key, in order
    pub fn keys(&self) -> Vec<ObjectKey> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    /// Writes recorded so far
    pub fn mutations(&self) -> Vec<Mutation> {
        self.mutations.lock().unwrap().clone()
    }

    pub fn clear_mutations(&self) {
        self.mutations.lock().unwrap().clear();
    }

    /// Manager status patches recorded so far
    pub fn status_patches(&self) -> Vec<ManagerStatus> {
        self.status_patches.lock().unwrap().clone()
    }

    pub fn last_status(&self) -> Option<ManagerStatus> {
        self.status_patches.lock().unwrap().last().cloned()
    }

    /// Make every read of `key` fail
    pub fn fail_reads(&self, key: ObjectKey) {
        self.read_failures.lock().unwrap().insert(key);
    }

    /// Make every write of `key` fail
    pub fn fail_writes(&self, key: ObjectKey) {
        self.write_failures.lock().unwrap().insert(key);
    }

    pub fn clear_failures(&self) {
        self.read_failures.lock().unwrap().clear();
        self.write_failures.lock().unwrap().clear();
    }

    pub fn set_license_api_available(&self, available: bool) {
        *self.license_api.lock().unwrap() = available;
    }

    /// Reports every stored Deployment as fully rolled out.
    pub fn mark_workloads_available(&self) {
        let mut objects = self.objects.lock().unwrap();
        for (key, body) in objects.iter_mut() {
            if key.kind != "Deployment" {
                continue;
            }
            let replicas = body
                .pointer("/spec/replicas")
                .and_then(Value::as_i64)
                .unwrap_or(1);
            body["status"] = serde_json::json!({
                "replicas": replicas,
                "availableReplicas": replicas,
            });
        }
    }

    fn check_read(&self, key: &ObjectKey) -> Result<(), StoreError> {
        if self.read_failures.lock().unwrap().contains(key) {
            return Err(StoreError::Api(format!("injected read failure for {key}")));
        }
        Ok(())
    }

    fn check_write(&self, key: &ObjectKey) -> Result<(), StoreError> {
        if self.write_failures.lock().unwrap().contains(key) {
            return Err(StoreError::Api(format!("injected write failure for {key}")));
        }
        Ok(())
    }

    fn read<K>(&self, namespace: Option<&str>, name: &str) -> Result<Option<K>, StoreError>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let key = ObjectKey::of::<K>(namespace, name);
        self.check_read(&key)?;
        self.object(&key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    fn bump_version(&self, body: &mut Value) {
        let mut next = self.next_version.lock().unwrap();
        *next += 1;
        body["metadata"]["resourceVersion"] = Value::String(next.to_string());
    }

    fn record(&self, mutation: Mutation) {
        self.mutations.lock().unwrap().push(mutation);
    }
}

#[async_trait::async_trait]
impl ClusterStore for MockClusterStore {
    async fn get_manager(&self, name: &str) -> Result<Option<Manager>, StoreError> {
        self.read(None, name)
    }

    async fn patch_manager_status(&self, name: &str, status: &ManagerStatus) -> Result<(), StoreError> {
        let key = ObjectKey::of::<Manager>(None, name);
        self.check_write(&key)?;
        let mut objects = self.objects.lock().unwrap();
        let body = objects
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        body["status"] = serde_json::to_value(status)?;
        self.status_patches.lock().unwrap().push(status.clone());
        Ok(())
    }

    async fn get_api_server(&self, name: &str) -> Result<Option<APIServer>, StoreError> {
        self.read(None, name)
    }

    async fn get_license_key(&self, name: &str) -> Result<Option<LicenseKey>, StoreError> {
        self.read(None, name)
    }

    async fn get_installation(&self, name: &str) -> Result<Option<Installation>, StoreError> {
        self.read(None, name)
    }

    async fn get_compliance(&self, name: &str) -> Result<Option<Compliance>, StoreError> {
        self.read(None, name)
    }

    async fn get_management_cluster(&self, name: &str) -> Result<Option<ManagementCluster>, StoreError> {
        self.read(None, name)
    }

    async fn get_management_cluster_connection(&self, name: &str) -> Result<Option<ManagementClusterConnection>, StoreError> {
        self.read(None, name)
    }

    async fn get_authentication(&self, name: &str) -> Result<Option<Authentication>, StoreError> {
        self.read(None, name)
    }

    async fn get_image_set(&self, name: &str) -> Result<Option<ImageSet>, StoreError> {
        self.read(None, name)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        self.read(Some(namespace), name)
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>, StoreError> {
        self.read(Some(namespace), name)
    }

    async fn namespace_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.read::<Namespace>(None, name)?.is_some())
    }

    async fn license_api_available(&self) -> Result<bool, StoreError> {
        Ok(*self.license_api.lock().unwrap())
    }

    async fn get_object(&self, key: &ObjectKey) -> Result<Option<Value>, StoreError> {
        self.check_read(key)?;
        Ok(self.object(key))
    }

    async fn create_object(&self, object: &ManagedObject) -> Result<Value, StoreError> {
        self.check_write(&object.key)?;
        if self.object(&object.key).is_some() {
            return Err(StoreError::Conflict(format!("{} already exists", object.key)));
        }
        let mut body = object.body.clone();
        self.bump_version(&mut body);
        self.objects
            .lock()
            .unwrap()
            .insert(object.key.clone(), body.clone());
        self.record(Mutation::Create(object.key.clone()));
        Ok(body)
    }

    async fn replace_object(&self, object: &ManagedObject) -> Result<Value, StoreError> {
        self.check_write(&object.key)?;
        let current = self
            .object(&object.key)
            .ok_or_else(|| StoreError::NotFound(object.key.to_string()))?;

        let expected = object.body.pointer("/metadata/resourceVersion");
        let actual = current.pointer("/metadata/resourceVersion");
        if expected.is_some() && expected != actual {
            return Err(StoreError::Conflict(format!(
                "{} was modified concurrently",
                object.key
            )));
        }

        let mut body = object.body.clone();
        self.bump_version(&mut body);
        self.objects
            .lock()
            .unwrap()
            .insert(object.key.clone(), body.clone());
        self.record(Mutation::Replace(object.key.clone()));
        Ok(body)
    }

    async fn delete_object(&self, key: &ObjectKey) -> Result<bool, StoreError> {
        self.check_write(key)?;
        let existed = self.objects.lock().unwrap().remove(key).is_some();
        if existed {
            self.record(Mutation::Delete(key.clone()));
        }
        Ok(existed)
    }
}
