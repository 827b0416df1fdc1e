use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// TTL bounds and quota applied to every namespace catalog
///
/// Invariant (checked by [`CatalogConfig::validate`]):
/// `minimum_ttl_ms <= default_ttl_ms <= maximum_ttl_ms` and `namespace_capacity >= -1`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CatalogConfig {
    /// TTL given to registrations that do not request one
    #[serde(default = "default_default_ttl_ms")]
    pub default_ttl_ms: u64,

    /// Lower clamp for requested TTLs
    #[serde(default = "default_minimum_ttl_ms")]
    pub minimum_ttl_ms: u64,

    /// Upper clamp for requested TTLs
    #[serde(default = "default_maximum_ttl_ms")]
    pub maximum_ttl_ms: u64,

    /// Maximum live instances per namespace (-1 = unlimited)
    #[serde(default = "default_namespace_capacity")]
    pub namespace_capacity: i64,

    /// How long a joining replica looks for a peer to sync from
    #[serde(default = "default_sync_wait_ms")]
    pub sync_wait_ms: u64,

    /// Period of the background expiration sweep
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: default_default_ttl_ms(),
            minimum_ttl_ms: default_minimum_ttl_ms(),
            maximum_ttl_ms: default_maximum_ttl_ms(),
            namespace_capacity: default_namespace_capacity(),
            sync_wait_ms: default_sync_wait_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl CatalogConfig {
    /// Validates TTL ordering and namespace capacity
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if any rule is violated
    pub fn validate(&self) -> Result<()> {
        if self.minimum_ttl_ms > self.maximum_ttl_ms {
            return Err(Error::InvalidConfig(
                "Maximum TTL must be larger or equal to minimum TTL".into(),
            ));
        }
        if self.default_ttl_ms < self.minimum_ttl_ms {
            return Err(Error::InvalidConfig(
                "Default TTL must be larger or equal to minimum TTL".into(),
            ));
        }
        if self.default_ttl_ms > self.maximum_ttl_ms {
            return Err(Error::InvalidConfig(
                "Default TTL must be smaller or equal to maximum TTL".into(),
            ));
        }
        if self.namespace_capacity < -1 {
            return Err(Error::InvalidConfig(format!(
                "Namespace capacity must be greater than or equal to -1, got {}",
                self.namespace_capacity
            )));
        }
        if self.sweep_interval_ms == 0 {
            return Err(Error::InvalidConfig("sweep_interval_ms must be > 0".into()));
        }
        Ok(())
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    pub fn minimum_ttl(&self) -> Duration {
        Duration::from_millis(self.minimum_ttl_ms)
    }

    pub fn maximum_ttl(&self) -> Duration {
        Duration::from_millis(self.maximum_ttl_ms)
    }

    pub fn sync_wait(&self) -> Duration {
        Duration::from_millis(self.sync_wait_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// `None` means unlimited
    pub fn capacity(&self) -> Option<usize> {
        if self.namespace_capacity < 0 {
            None
        } else {
            Some(self.namespace_capacity as usize)
        }
    }
}

fn default_default_ttl_ms() -> u64 {
    30_000
}
fn default_minimum_ttl_ms() -> u64 {
    5_000
}
fn default_maximum_ttl_ms() -> u64 {
    600_000
}
fn default_namespace_capacity() -> i64 {
    50
}
fn default_sync_wait_ms() -> u64 {
    30_000
}
fn default_sweep_interval_ms() -> u64 {
    1_000
}
