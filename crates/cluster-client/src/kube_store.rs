//! Kubernetes-backed cluster store
//!
//! Typed reads go through `Api<K>`, desired objects are written as
//! `DynamicObject`s resolved from their `apiVersion` and `kind`.

use crate::error::StoreError;
use crate::object::{ManagedObject, ObjectKey};
use crate::store_trait::ClusterStore;
use crds::{
    APIServer, Authentication, Compliance, ImageSet, Installation, LicenseKey, Manager,
    ManagerStatus, ManagementCluster, ManagementClusterConnection,
};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use kube::api::{Api, DeleteParams, DynamicObject, Patch, PatchParams, PostParams};
use kube::discovery::{ApiResource, Discovery};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Debug;
use tracing::debug;

/// Cluster store talking to the API server.
#[derive(Clone)]
pub struct KubeClusterStore {
    client: Client,
}

impl std::fmt::Debug for KubeClusterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterStore").finish_non_exhaustive()
    }
}

impl KubeClusterStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Underlying client, shared with the watch machinery.
    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn get_cluster_scoped<K>(&self, name: &str) -> Result<Option<K>, StoreError>
    where
        K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
    {
        let api: Api<K> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    fn dynamic_api(&self, key: &ObjectKey) -> Api<DynamicObject> {
        let ar = ApiResource::from_gvk(&key.gvk());
        match &key.namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        }
    }
}

#[async_trait::async_trait]
impl ClusterStore for KubeClusterStore {
    async fn get_manager(&self, name: &str) -> Result<Option<Manager>, StoreError> {
        self.get_cluster_scoped(name).await
    }

    async fn patch_manager_status(&self, name: &str, status: &ManagerStatus) -> Result<(), StoreError> {
        let api: Api<Manager> = Api::all(self.client.clone());
        let patch = serde_json::json!({ "status": status });
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        debug!(name, state = ?status.state, "Patched Manager status");
        Ok(())
    }

    async fn get_api_server(&self, name: &str) -> Result<Option<APIServer>, StoreError> {
        self.get_cluster_scoped(name).await
    }

    async fn get_license_key(&self, name: &str) -> Result<Option<LicenseKey>, StoreError> {
        self.get_cluster_scoped(name).await
    }

    async fn get_installation(&self, name: &str) -> Result<Option<Installation>, StoreError> {
        self.get_cluster_scoped(name).await
    }

    async fn get_compliance(&self, name: &str) -> Result<Option<Compliance>, StoreError> {
        self.get_cluster_scoped(name).await
    }

    async fn get_management_cluster(&self, name: &str) -> Result<Option<ManagementCluster>, StoreError> {
        self.get_cluster_scoped(name).await
    }

    async fn get_management_cluster_connection(&self, name: &str) -> Result<Option<ManagementClusterConnection>, StoreError> {
        self.get_cluster_scoped(name).await
    }

    async fn get_authentication(&self, name: &str) -> Result<Option<Authentication>, StoreError> {
        self.get_cluster_scoped(name).await
    }

    async fn get_image_set(&self, name: &str) -> Result<Option<ImageSet>, StoreError> {
        self.get_cluster_scoped(name).await
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>, StoreError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn namespace_exists(&self, name: &str) -> Result<bool, StoreError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?.is_some())
    }

    async fn license_api_available(&self) -> Result<bool, StoreError> {
        let group = LicenseKey::group(&());
        let kind = LicenseKey::kind(&());

        let discovery = Discovery::new(self.client.clone())
            .filter(&[group.as_ref()])
            .run()
            .await?;

        let found = discovery.groups().any(|api_group| {
            api_group
                .recommended_resources()
                .iter()
                .any(|(ar, _caps)| ar.kind == kind)
        });
        debug!(group = %group, found, "Checked license API discovery");
        Ok(found)
    }

    async fn get_object(&self, key: &ObjectKey) -> Result<Option<Value>, StoreError> {
        let current = self.dynamic_api(key).get_opt(&key.name).await?;
        current.map(serde_json::to_value).transpose().map_err(Into::into)
    }

    async fn create_object(&self, object: &ManagedObject) -> Result<Value, StoreError> {
        let obj: DynamicObject = serde_json::from_value(object.body.clone())?;
        let created = self
            .dynamic_api(&object.key)
            .create(&PostParams::default(), &obj)
            .await?;
        Ok(serde_json::to_value(created)?)
    }

    async fn replace_object(&self, object: &ManagedObject) -> Result<Value, StoreError> {
        let obj: DynamicObject = serde_json::from_value(object.body.clone())?;
        let replaced = self
            .dynamic_api(&object.key)
            .replace(&object.key.name, &PostParams::default(), &obj)
            .await?;
        Ok(serde_json::to_value(replaced)?)
    }

    async fn delete_object(&self, key: &ObjectKey) -> Result<bool, StoreError> {
        match self
            .dynamic_api(key)
            .delete(&key.name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
