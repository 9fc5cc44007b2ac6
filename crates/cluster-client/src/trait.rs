//! ClusterStore trait for mocking
//!
//! The controller only talks to the API server through this trait. The
//! concrete [`crate::KubeClusterStore`] implements it against a live cluster
//! and tests use [`crate::MockClusterStore`] (feature `test-util`).

use crate::error::StoreError;
use crate::object::{ManagedObject, ObjectKey};
use crds::{
    APIServer, Authentication, Compliance, ImageSet, Installation, LicenseKey, Manager,
    ManagerStatus, ManagementCluster, ManagementClusterConnection,
};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use serde_json::Value;

/// Object store operations used by reconciliation.
///
/// Typed reads return `Ok(None)` when the object does not exist, so callers
/// can tell absence apart from failure. All async methods must be `Send` to
/// work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ClusterStore: Send + Sync {
    // Primary resource
    async fn get_manager(&self, name: &str) -> Result<Option<Manager>, StoreError>;
    async fn patch_manager_status(&self, name: &str, status: &ManagerStatus) -> Result<(), StoreError>;

    // Dependencies (all cluster-scoped)
    async fn get_api_server(&self, name: &str) -> Result<Option<APIServer>, StoreError>;
    async fn get_license_key(&self, name: &str) -> Result<Option<LicenseKey>, StoreError>;
    async fn get_installation(&self, name: &str) -> Result<Option<Installation>, StoreError>;
    async fn get_compliance(&self, name: &str) -> Result<Option<Compliance>, StoreError>;
    async fn get_management_cluster(&self, name: &str) -> Result<Option<ManagementCluster>, StoreError>;
    async fn get_management_cluster_connection(&self, name: &str) -> Result<Option<ManagementClusterConnection>, StoreError>;
    async fn get_authentication(&self, name: &str) -> Result<Option<Authentication>, StoreError>;
    async fn get_image_set(&self, name: &str) -> Result<Option<ImageSet>, StoreError>;

    // Core objects
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError>;
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>, StoreError>;
    async fn namespace_exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Whether the aggregated API serving `LicenseKey` is discoverable.
    async fn license_api_available(&self) -> Result<bool, StoreError>;

    // Untyped access for the apply engine
    async fn get_object(&self, key: &ObjectKey) -> Result<Option<Value>, StoreError>;
    async fn create_object(&self, object: &ManagedObject) -> Result<Value, StoreError>;
    /// Replaces an existing object. The body must carry the
    /// `metadata.resourceVersion` it was read at.
    async fn replace_object(&self, object: &ManagedObject) -> Result<Value, StoreError>;
    /// Deletes an object, returning `false` when it was already gone.
    async fn delete_object(&self, key: &ObjectKey) -> Result<bool, StoreError>;
}
