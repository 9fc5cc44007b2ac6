//! Prints the CustomResourceDefinition manifests for every kind in this crate
//! as a multi-document YAML stream.

use anyhow::Result;
use crds::{
    APIServer, Authentication, Compliance, ImageSet, Installation, LicenseKey, Manager,
    ManagementCluster, ManagementClusterConnection,
};
use kube::CustomResourceExt;

fn main() -> Result<()> {
    let definitions = [
        Manager::crd(),
        Installation::crd(),
        LicenseKey::crd(),
        APIServer::crd(),
        Compliance::crd(),
        ManagementCluster::crd(),
        ManagementClusterConnection::crd(),
        Authentication::crd(),
        ImageSet::crd(),
    ];

    for crd in &definitions {
        println!("---");
        print!("{}", serde_yaml::to_string(crd)?);
    }

    Ok(())
}
