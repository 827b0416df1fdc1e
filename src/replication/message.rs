use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;

use crate::MemberId;
use crate::Namespace;
use crate::ReplicationError;
use crate::Result;

/// Message queued for delivery to peers.
///
/// `target == None` fans out to every connected peer; otherwise it is
/// delivered only to that member.
#[derive(Debug, Clone, PartialEq)]
pub struct OutMessage {
    pub target: Option<MemberId>,
    pub namespace: Namespace,
    pub data: Bytes,
}

/// Message received from a peer
#[derive(Debug, Clone, PartialEq)]
pub struct InMessage {
    pub member_id: MemberId,
    pub namespace: Namespace,
    pub data: Bytes,
}

/// Body of an event's `data:` field
#[derive(Serialize, Deserialize)]
struct WireMessage {
    namespace: Namespace,
    #[serde(with = "crate::utils::serde_base64")]
    data: Vec<u8>,
}

impl OutMessage {
    pub fn broadcast(
        namespace: Namespace,
        data: Bytes,
    ) -> Self {
        OutMessage {
            target: None,
            namespace,
            data,
        }
    }

    pub fn to(
        target: MemberId,
        namespace: Namespace,
        data: Bytes,
    ) -> Self {
        OutMessage {
            target: Some(target),
            namespace,
            data,
        }
    }

    /// Event payload: `{"namespace": ..., "data": <base64>}`
    pub(crate) fn to_wire(&self) -> Result<String> {
        let wire = WireMessage {
            namespace: self.namespace.clone(),
            data: self.data.to_vec(),
        };
        serde_json::to_string(&wire).map_err(|e| ReplicationError::Marshal(e).into())
    }
}

impl InMessage {
    pub(crate) fn from_wire(
        member_id: MemberId,
        payload: &str,
    ) -> Result<Self> {
        let wire: WireMessage = serde_json::from_str(payload).map_err(ReplicationError::Marshal)?;
        Ok(InMessage {
            member_id,
            namespace: wire.namespace,
            data: Bytes::from(wire.data),
        })
    }
}
