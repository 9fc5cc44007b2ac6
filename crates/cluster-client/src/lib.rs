//! Cluster Object Store
//!
//! Read and write access to the Kubernetes objects the Manager controller
//! depends on or manages, behind a trait so reconciliation can be exercised
//! against an in-memory store.
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::{ClusterStore, KubeClusterStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let store = KubeClusterStore::new(client);
//!
//! // Typed reads return `None` when the object does not exist
//! let manager = store.get_manager("tigera-secure").await?;
//!
//! // Discovery check for the aggregated license API
//! let ready = store.license_api_available().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod kube_store;
pub mod object;
#[path = "trait.rs"]
pub mod store_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use error::StoreError;
pub use kube_store::KubeClusterStore;
pub use object::{ManagedObject, ObjectKey};
pub use store_trait::ClusterStore;
#[cfg(feature = "test-util")]
pub use mock::{MockClusterStore, Mutation};
