use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;

use super::InstanceStatus;
use super::ServiceInstance;
use crate::ReplicationError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplicationType {
    Register,
    Deregister,
    Renew,
    SetStatus,
    ReadRepair,
}

/// Catalog mutation as exchanged between members:
/// `{"type": "REGISTER", "payload": <base64>}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicatedMessage {
    #[serde(rename = "type")]
    pub rep_type: ReplicationType,
    #[serde(with = "crate::utils::serde_base64")]
    pub payload: Vec<u8>,
}

/// Payload of a `SETSTATUS` message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicatedStatus {
    pub instance_id: String,
    pub status: InstanceStatus,
}

/// Decoded form of a [`ReplicatedMessage`]
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogMutation {
    Register(ServiceInstance),
    Deregister(String),
    Renew(String),
    SetStatus {
        instance_id: String,
        status: InstanceStatus,
    },
    ReadRepair(String),
}

impl CatalogMutation {
    pub fn rep_type(&self) -> ReplicationType {
        match self {
            CatalogMutation::Register(_) => ReplicationType::Register,
            CatalogMutation::Deregister(_) => ReplicationType::Deregister,
            CatalogMutation::Renew(_) => ReplicationType::Renew,
            CatalogMutation::SetStatus { .. } => ReplicationType::SetStatus,
            CatalogMutation::ReadRepair(_) => ReplicationType::ReadRepair,
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        let payload = match self {
            CatalogMutation::Register(instance) => {
                serde_json::to_vec(instance).map_err(ReplicationError::Marshal)?
            }
            CatalogMutation::Deregister(id) | CatalogMutation::Renew(id) | CatalogMutation::ReadRepair(id) => {
                id.as_bytes().to_vec()
            }
            CatalogMutation::SetStatus { instance_id, status } => serde_json::to_vec(&ReplicatedStatus {
                instance_id: instance_id.clone(),
                status: *status,
            })
            .map_err(ReplicationError::Marshal)?,
        };
        let message = ReplicatedMessage {
            rep_type: self.rep_type(),
            payload,
        };
        let encoded = serde_json::to_vec(&message).map_err(ReplicationError::Marshal)?;
        Ok(Bytes::from(encoded))
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let message: ReplicatedMessage = serde_json::from_slice(data).map_err(ReplicationError::Marshal)?;
        let id = || String::from_utf8_lossy(&message.payload).into_owned();

        let mutation = match message.rep_type {
            ReplicationType::Register => CatalogMutation::Register(
                serde_json::from_slice(&message.payload).map_err(ReplicationError::Marshal)?,
            ),
            ReplicationType::Deregister => CatalogMutation::Deregister(id()),
            ReplicationType::Renew => CatalogMutation::Renew(id()),
            ReplicationType::SetStatus => {
                let status: ReplicatedStatus =
                    serde_json::from_slice(&message.payload).map_err(ReplicationError::Marshal)?;
                CatalogMutation::SetStatus {
                    instance_id: status.instance_id,
                    status: status.status,
                }
            }
            ReplicationType::ReadRepair => CatalogMutation::ReadRepair(id()),
        };
        Ok(mutation)
    }
}
