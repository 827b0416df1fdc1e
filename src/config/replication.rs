use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Tuning of the peer-to-peer replication transport
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReplicationConfig {
    /// Replicate catalogs across the cluster
    #[serde(default)]
    pub enabled: bool,

    /// Timeout of every bounded channel hand-off
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Outgoing broadcast queue depth
    #[serde(default = "default_queue_size")]
    pub broadcast_queue_size: usize,

    /// Outgoing unicast (read-repair) queue depth
    #[serde(default = "default_queue_size")]
    pub repair_queue_size: usize,

    /// Inbound events queue shared by all peer clients
    #[serde(default = "default_queue_size")]
    pub notification_queue_size: usize,

    /// Per-namespace inbound queue of a replicated catalog
    #[serde(default = "default_catalog_queue_size")]
    pub catalog_queue_size: usize,

    /// Per-peer stream writer queue depth
    #[serde(default = "default_peer_queue_size")]
    pub peer_queue_size: usize,

    /// Stream flush tick, independent of message arrival
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// First reconnect delay of a peer client (doubles per attempt)
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,

    /// Ceiling of the reconnect delay
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,

    /// Pause between sync attempts while no peer answers
    #[serde(default = "default_sync_poll_interval_ms")]
    pub sync_poll_interval_ms: u64,

    /// A peer disconnected longer than this makes replication unhealthy
    #[serde(default = "default_disconnected_threshold_ms")]
    pub disconnected_threshold_ms: u64,

    /// Negotiate gzip on the streaming endpoints
    #[serde(default = "default_gzip")]
    pub gzip: bool,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            send_timeout_ms: default_send_timeout_ms(),
            broadcast_queue_size: default_queue_size(),
            repair_queue_size: default_queue_size(),
            notification_queue_size: default_queue_size(),
            catalog_queue_size: default_catalog_queue_size(),
            peer_queue_size: default_peer_queue_size(),
            flush_interval_ms: default_flush_interval_ms(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            sync_poll_interval_ms: default_sync_poll_interval_ms(),
            disconnected_threshold_ms: default_disconnected_threshold_ms(),
            gzip: default_gzip(),
        }
    }
}

impl ReplicationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.send_timeout_ms == 0 {
            return Err(Error::InvalidConfig("send_timeout_ms must be > 0".into()));
        }
        for (name, size) in [
            ("broadcast_queue_size", self.broadcast_queue_size),
            ("repair_queue_size", self.repair_queue_size),
            ("notification_queue_size", self.notification_queue_size),
            ("catalog_queue_size", self.catalog_queue_size),
            ("peer_queue_size", self.peer_queue_size),
        ] {
            if size == 0 {
                return Err(Error::InvalidConfig(format!("{} must be > 0", name)));
            }
        }
        for (name, millis) in [
            ("flush_interval_ms", self.flush_interval_ms),
            ("reconnect_base_delay_ms", self.reconnect_base_delay_ms),
            ("sync_poll_interval_ms", self.sync_poll_interval_ms),
            ("disconnected_threshold_ms", self.disconnected_threshold_ms),
        ] {
            if millis == 0 {
                return Err(Error::InvalidConfig(format!("{} must be > 0", name)));
            }
        }
        if self.reconnect_base_delay_ms > self.reconnect_max_delay_ms {
            return Err(Error::InvalidConfig(format!(
                "reconnect_base_delay_ms ({}) exceeds reconnect_max_delay_ms ({})",
                self.reconnect_base_delay_ms, self.reconnect_max_delay_ms
            )));
        }
        Ok(())
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }

    pub fn sync_poll_interval(&self) -> Duration {
        Duration::from_millis(self.sync_poll_interval_ms)
    }

    pub fn disconnected_threshold(&self) -> Duration {
        Duration::from_millis(self.disconnected_threshold_ms)
    }
}

fn default_send_timeout_ms() -> u64 {
    7_000
}
fn default_queue_size() -> usize {
    512
}
fn default_catalog_queue_size() -> usize {
    256
}
fn default_peer_queue_size() -> usize {
    256
}
fn default_flush_interval_ms() -> u64 {
    100
}
fn default_reconnect_base_delay_ms() -> u64 {
    3_000
}
fn default_reconnect_max_delay_ms() -> u64 {
    300_000
}
fn default_sync_poll_interval_ms() -> u64 {
    200
}
fn default_disconnected_threshold_ms() -> u64 {
    600_000
}
fn default_gzip() -> bool {
    true
}
