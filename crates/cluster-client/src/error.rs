//! Cluster store errors

use thiserror::Error;

/// Errors returned by a [`crate::ClusterStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object is missing required identity fields
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write rejected because the object changed or already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other API failure
    #[error("API error: {0}")]
    Api(String),
}

impl StoreError {
    /// Whether the error means the object does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::NotFound(_) => true,
            StoreError::Kube(kube::Error::Api(ae)) => ae.code == 404,
            _ => false,
        }
    }

    /// Whether the error is an optimistic concurrency or create collision.
    pub fn is_conflict(&self) -> bool {
        match self {
            StoreError::Conflict(_) => true,
            StoreError::Kube(kube::Error::Api(ae)) => ae.code == 409,
            _ => false,
        }
    }
}
