//! LicenseKey resource
//!
//! Served by the aggregated API server, so it only becomes discoverable once
//! that server is up.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Licensed feature that enables the compliance integration.
pub const COMPLIANCE_FEATURE: &str = "compliance";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "projectcalico.org",
    version = "v3",
    kind = "LicenseKey",
    status = "LicenseKeyStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct LicenseKeySpec {
    /// Signed license token
    pub token: String,

    /// Certificate used to verify the token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LicenseKeyStatus {
    /// License expiry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<chrono::DateTime<chrono::Utc>>,

    /// Features granted by the license
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl LicenseKey {
    /// Whether the license grants `feature`.
    pub fn is_feature_active(&self, feature: &str) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.features.iter().any(|f| f == feature))
    }

    /// Whether the license expired before `now`. A license without an expiry
    /// never expires.
    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.expiry)
            .is_some_and(|expiry| expiry <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn license(features: &[&str], expiry: Option<chrono::DateTime<Utc>>) -> LicenseKey {
        let mut key = LicenseKey::new(crate::DEFAULT_INSTALLATION_NAME, LicenseKeySpec::default());
        key.status = Some(LicenseKeyStatus {
            expiry,
            features: features.iter().map(|f| f.to_string()).collect(),
        });
        key
    }

    #[test]
    fn test_feature_lookup() {
        let key = license(&["compliance", "packetcapture"], None);
        assert!(key.is_feature_active(COMPLIANCE_FEATURE));
        assert!(!key.is_feature_active("egress-access-control"));
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        assert!(!license(&[], None).is_expired(now));
        assert!(!license(&[], Some(now + Duration::days(1))).is_expired(now));
        assert!(license(&[], Some(now - Duration::days(1))).is_expired(now));
    }
}
