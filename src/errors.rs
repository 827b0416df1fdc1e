//! Service Registry Error Hierarchy
//!
//! Defines the error types for the replicated catalog engine, categorized by
//! layer: catalog store, replication protocol and peer networking.

use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Catalog store failures surfaced to API callers
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration loading failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration rule violations detected by `validate()`
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Replication protocol failures
    #[error(transparent)]
    Replication(#[from] ReplicationError),

    /// Peer networking failures
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

/// Error taxonomy of a namespace catalog.
///
/// Every variant carries a human readable message and an optional cause
/// (usually the offending service name or instance id).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("bad request: {message} ({cause:?})")]
    BadRequest {
        message: String,
        cause: Option<String>,
    },

    #[error("no such service name: {message} ({cause:?})")]
    NoSuchServiceName {
        message: String,
        cause: Option<String>,
    },

    #[error("no such service instance: {message} ({cause:?})")]
    NoSuchServiceInstance {
        message: String,
        cause: Option<String>,
    },

    #[error("namespace quota exceeded: {message} ({cause:?})")]
    NamespaceQuotaExceeded {
        message: String,
        cause: Option<String>,
    },

    #[error("internal server error: {message} ({cause:?})")]
    InternalServerError {
        message: String,
        cause: Option<String>,
    },
}

impl StoreError {
    pub(crate) fn bad_request(message: &str) -> Self {
        StoreError::BadRequest {
            message: message.to_string(),
            cause: None,
        }
    }

    pub(crate) fn no_such_service(service_name: &str) -> Self {
        StoreError::NoSuchServiceName {
            message: "no such service".to_string(),
            cause: Some(service_name.to_string()),
        }
    }

    pub(crate) fn no_such_instance(instance_id: &str) -> Self {
        StoreError::NoSuchServiceInstance {
            message: "no such service instance".to_string(),
            cause: Some(instance_id.to_string()),
        }
    }

    pub(crate) fn quota_exceeded(size: usize) -> Self {
        StoreError::NamespaceQuotaExceeded {
            message: "Quota exceeded".to_string(),
            cause: Some(size.to_string()),
        }
    }

    pub(crate) fn internal(
        message: &str,
        cause: impl ToString,
    ) -> Self {
        StoreError::InternalServerError {
            message: message.to_string(),
            cause: Some(cause.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    /// One replicator per namespace, enforced once
    #[error("Replicator {0} already exists")]
    ReplicatorExists(String),

    /// Bounded hand-off did not complete within the send timeout
    #[error("Send to {channel} timed out after {duration:?}")]
    SendTimeout {
        channel: &'static str,
        duration: Duration,
    },

    /// Receiving side of a hand-off channel has gone away
    #[error("Channel {0} is closed")]
    ChannelClosed(&'static str),

    /// Envelope or payload (de)serialization failures
    #[error(transparent)]
    Marshal(#[from] serde_json::Error),

    /// Base64 payload decoding failures
    #[error(transparent)]
    Payload(#[from] base64::DecodeError),

    /// Operation attempted after `stop()`
    #[error("Replication server has stopped")]
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Listener could not be bound on the self address
    #[error("Failed to bind replication listener on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Missing or malformed membership data
    #[error("{0}")]
    Connect(String),

    /// HTTP client transport errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Peer answered with something other than 200
    #[error("Code:{status}, Msg:{body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Stream I/O failures
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed event stream
    #[error("Failed to decode event stream: {0}")]
    Decode(String),
}
