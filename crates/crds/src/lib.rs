//! Manager Controller CRD Definitions
//!
//! Kubernetes Custom Resource Definitions consumed by the Manager controller.
//! The controller owns only the `Manager` status; every other kind here is
//! read as a dependency.

pub mod manager;
pub mod installation;
pub mod license_key;
pub mod components;
pub mod topology;
pub mod authentication;
pub mod image_set;

pub use manager::*;
pub use installation::*;
pub use license_key::*;
pub use components::*;
pub use topology::*;
pub use authentication::*;
pub use image_set::*;

/// API group shared by the operator-owned kinds.
pub const OPERATOR_GROUP: &str = "operator.tigera.io";

/// Status state reported by a component that has fully converged.
pub const STATE_READY: &str = "Ready";

/// Name of the singleton `Manager`, and of the peer singletons
/// (`APIServer`, `Compliance`, `ManagementCluster`,
/// `ManagementClusterConnection`, `Authentication`).
pub const DEFAULT_INSTANCE_NAME: &str = "tigera-secure";

/// Name of the singleton `Installation` and `LicenseKey`.
pub const DEFAULT_INSTALLATION_NAME: &str = "default";
