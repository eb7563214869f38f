//! Resource references and observed resource state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Category of a managed cloud resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Instance,
    Disk,
    Database,
    Certificate,
    ContainerService,
    LoadBalancer,
    Distribution,
    Bucket,
    StaticIp,
    Domain,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Instance => "instance",
            ResourceKind::Disk => "disk",
            ResourceKind::Database => "database",
            ResourceKind::Certificate => "certificate",
            ResourceKind::ContainerService => "container-service",
            ResourceKind::LoadBalancer => "load-balancer",
            ResourceKind::Distribution => "distribution",
            ResourceKind::Bucket => "bucket",
            ResourceKind::StaticIp => "static-ip",
            ResourceKind::Domain => "domain",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names one resource on the platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn instance(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Instance, name)
    }

    pub fn disk(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Disk, name)
    }

    pub fn database(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Database, name)
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.kind, self.name)
    }
}

/// One read of a resource's descriptive endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub resource: ResourceRef,

    /// Raw state field as reported by the platform (e.g. "running", "available")
    pub state: String,

    /// Other attributes returned alongside the state
    pub attributes: HashMap<String, serde_json::Value>,

    /// When this snapshot was read
    pub observed_at: DateTime<Utc>,
}

impl ResourceSnapshot {
    pub fn new(resource: ResourceRef, state: impl Into<String>) -> Self {
        Self {
            resource,
            state: state.into(),
            attributes: HashMap::new(),
            observed_at: Utc::now(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
