//! Untyped object identity and payload
//!
//! Desired objects flow through the apply engine as JSON documents so that
//! typed and rendered resources can be handled the same way.

use crate::error::StoreError;
use kube::core::GroupVersionKind;
use kube::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identity of a Kubernetes object: `apiVersion`, `kind`, optional
/// namespace and name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectKey {
    pub api_version: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        namespace: Option<&str>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            namespace: namespace.map(str::to_string),
            name: name.into(),
        }
    }

    /// Key for a statically typed resource.
    pub fn of<K>(namespace: Option<&str>, name: impl Into<String>) -> Self
    where
        K: Resource<DynamicType = ()>,
    {
        Self::new(K::api_version(&()), K::kind(&()), namespace, name)
    }

    /// Splits `apiVersion` into group and version. Core resources have an
    /// empty group.
    pub fn group_version(&self) -> (&str, &str) {
        match self.api_version.split_once('/') {
            Some((group, version)) => (group, version),
            None => ("", self.api_version.as_str()),
        }
    }

    pub fn gvk(&self) -> GroupVersionKind {
        let (group, version) = self.group_version();
        GroupVersionKind::gvk(group, version, &self.kind)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// A full object document together with its parsed identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagedObject {
    pub key: ObjectKey,
    pub body: Value,
}

impl ManagedObject {
    /// Builds an object from a JSON document, reading its identity from
    /// `apiVersion`, `kind` and `metadata`.
    pub fn from_value(body: Value) -> Result<Self, StoreError> {
        let field = |pointer: &str| body.pointer(pointer).and_then(Value::as_str);

        let api_version = field("/apiVersion")
            .ok_or_else(|| StoreError::InvalidObject("missing apiVersion".to_string()))?;
        let kind = field("/kind")
            .ok_or_else(|| StoreError::InvalidObject("missing kind".to_string()))?;
        let name = field("/metadata/name").ok_or_else(|| {
            StoreError::InvalidObject(format!("{kind} is missing metadata.name"))
        })?;
        let key = ObjectKey::new(api_version, kind, field("/metadata/namespace"), name);

        Ok(Self { key, body })
    }

    /// Serializes a typed resource.
    pub fn from_resource<K>(resource: &K) -> Result<Self, StoreError>
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let mut body = serde_json::to_value(resource)?;
        if let Some(map) = body.as_object_mut() {
            map.entry("apiVersion")
                .or_insert_with(|| Value::String(K::api_version(&()).into_owned()));
            map.entry("kind")
                .or_insert_with(|| Value::String(K::kind(&()).into_owned()));
        }
        Self::from_value(body)
    }
}
