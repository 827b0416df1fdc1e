use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use std::time::SystemTime;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

use crate::StoreError;

/// Lifecycle status reported by an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Starting,
    #[default]
    Up,
    OutOfService,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Starting => "STARTING",
            InstanceStatus::Up => "UP",
            InstanceStatus::OutOfService => "OUT_OF_SERVICE",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STARTING" => Ok(InstanceStatus::Starting),
            "UP" => Ok(InstanceStatus::Up),
            "OUT_OF_SERVICE" => Ok(InstanceStatus::OutOfService),
            _ => Err(StoreError::bad_request("unsupported instance status")),
        }
    }
}

/// Network address of an instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(rename = "type")]
    pub endpoint_type: String,
    pub value: String,
}

impl Endpoint {
    pub fn new(
        endpoint_type: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Endpoint {
            endpoint_type: endpoint_type.into(),
            value: value.into(),
        }
    }
}

/// Named, logical service grouping one or more instances
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Service {
    pub service_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Assigned by the catalog when empty
    #[serde(default)]
    pub id: String,
    pub service_name: String,
    pub endpoint: Endpoint,
    #[serde(default)]
    pub status: InstanceStatus,
    #[serde(default, with = "crate::utils::serde_base64")]
    pub metadata: Vec<u8>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Opaque attributes owned by auxiliary catalogs
    #[serde(default)]
    pub extension: HashMap<String, serde_json::Value>,
    /// Set once on first registration; its presence on an inbound
    /// registration marks it as a replica of a registration made elsewhere
    #[serde(default)]
    pub registration_time: Option<SystemTime>,
    #[serde(default)]
    pub last_renewal: Option<SystemTime>,
    /// Zero means "use the catalog default"
    #[serde(default)]
    pub ttl: Duration,
}

impl ServiceInstance {
    pub fn new(
        service_name: impl Into<String>,
        endpoint: Endpoint,
    ) -> Self {
        ServiceInstance {
            id: String::new(),
            service_name: service_name.into(),
            endpoint,
            status: InstanceStatus::default(),
            metadata: Vec::new(),
            tags: Vec::new(),
            extension: HashMap::new(),
            registration_time: None,
            last_renewal: None,
            ttl: Duration::ZERO,
        }
    }

    pub fn with_ttl(
        mut self,
        ttl: Duration,
    ) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_status(
        mut self,
        status: InstanceStatus,
    ) -> Self {
        self.status = status;
        self
    }

    pub fn with_metadata(
        mut self,
        metadata: impl Into<Vec<u8>>,
    ) -> Self {
        self.metadata = metadata.into();
        self
    }

    pub fn with_tags<I, S>(
        mut self,
        tags: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_tag(
        &self,
        tag: &str,
    ) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Deterministic instance id: the first 16 hex characters of
/// `sha256("<service>/<endpoint type>/<endpoint value>")`.
pub fn compute_instance_id(
    service_name: &str,
    endpoint: &Endpoint,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(service_name.as_bytes());
    hasher.update(b"/");
    hasher.update(endpoint.endpoint_type.as_bytes());
    hasher.update(b"/");
    hasher.update(endpoint.value.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}
