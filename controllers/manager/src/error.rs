//! Controller-specific error types.
//!
//! Every error maps onto one of four kinds used to decide how the pass is
//! reported and retried.

use crate::pki::CertificateError;
use cluster_client::{ObjectKey, StoreError};
use thiserror::Error;

/// Failure taxonomy shared by gates and the apply engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required object does not exist
    NotFound,
    /// Configuration or content is invalid and will not fix itself
    Invalid,
    /// Declared configuration is contradictory
    Conflict,
    /// API or network failure that may succeed on retry
    Transient,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Invalid => "invalid",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Transient => "transient",
        }
    }
}

/// Errors that can occur in the Manager controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Cluster API error
    #[error("Cluster store error: {0}")]
    Store(#[from] StoreError),

    /// A required object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Contradictory configuration
    #[error("Conflicting configuration: {0}")]
    Conflict(String),

    /// TLS material could not be parsed, attributed or generated
    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),

    /// The renderer failed to produce objects
    #[error("Render error: {0}")]
    Render(String),

    /// Image override failed
    #[error("ImageSet error: {0}")]
    ImageSet(String),

    /// Creating, updating or deleting an object failed
    #[error("Failed to apply {object}: {source}")]
    Apply {
        object: ObjectKey,
        #[source]
        source: StoreError,
    },

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Probe server failed
    #[error("Probe server error: {0}")]
    Probe(String),
}

impl ControllerError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ControllerError::Store(e) | ControllerError::Apply { source: e, .. } => {
                if e.is_not_found() {
                    ErrorKind::NotFound
                } else if e.is_conflict() {
                    ErrorKind::Conflict
                } else if matches!(e, StoreError::InvalidObject(_) | StoreError::Serialization(_)) {
                    ErrorKind::Invalid
                } else {
                    ErrorKind::Transient
                }
            }
            ControllerError::NotFound(_) => ErrorKind::NotFound,
            ControllerError::InvalidConfig(_)
            | ControllerError::Certificate(_)
            | ControllerError::Render(_)
            | ControllerError::ImageSet(_) => ErrorKind::Invalid,
            ControllerError::Conflict(_) => ErrorKind::Conflict,
            ControllerError::Watch(_) | ControllerError::Probe(_) => ErrorKind::Transient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(ControllerError::NotFound("Installation".into()).kind(), ErrorKind::NotFound);
        assert_eq!(ControllerError::Conflict("hub and spoke".into()).kind(), ErrorKind::Conflict);
        assert_eq!(ControllerError::InvalidConfig("auth".into()).kind(), ErrorKind::Invalid);
        assert_eq!(
            ControllerError::Store(StoreError::Api("timeout".into())).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            ControllerError::Store(StoreError::NotFound("x".into())).kind(),
            ErrorKind::NotFound
        );
    }
}
