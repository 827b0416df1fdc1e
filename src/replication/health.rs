use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use dashmap::DashMap;
#[cfg(test)]
use mockall::automock;

use crate::MemberId;

/// Connection state of one outbound replication client
#[cfg_attr(test, automock)]
pub trait ClientConnection: Send + Sync + 'static {
    fn is_connected(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy { message: String },
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

struct ClientHealth {
    client: Arc<dyn ClientConnection>,
    disconnected_since: Option<Instant>,
}

/// Reports unhealthy once any replication client has stayed disconnected
/// for at least `threshold`
pub struct ReplicationHealthMonitor {
    clients: DashMap<MemberId, ClientHealth>,
    threshold: Duration,
}

impl ReplicationHealthMonitor {
    pub fn new(threshold: Duration) -> Self {
        ReplicationHealthMonitor {
            clients: DashMap::new(),
            threshold,
        }
    }

    pub fn add_client(
        &self,
        member_id: MemberId,
        client: Arc<dyn ClientConnection>,
    ) {
        self.clients.insert(
            member_id,
            ClientHealth {
                client,
                disconnected_since: None,
            },
        );
    }

    pub fn remove_client(
        &self,
        member_id: &MemberId,
    ) {
        self.clients.remove(member_id);
    }

    pub fn check(&self) -> HealthStatus {
        self.check_at(Instant::now())
    }

    pub(crate) fn check_at(
        &self,
        now: Instant,
    ) -> HealthStatus {
        let total = self.clients.len();
        let mut failed = 0;
        for mut entry in self.clients.iter_mut() {
            let health = entry.value_mut();
            if health.client.is_connected() {
                health.disconnected_since = None;
                continue;
            }
            let since = *health.disconnected_since.get_or_insert(now);
            if now.saturating_duration_since(since) >= self.threshold {
                failed += 1;
            }
        }

        if failed == 0 {
            return HealthStatus::Healthy;
        }
        HealthStatus::Unhealthy {
            message: format!(
                "{}/{} replication clients disconnected for at least {:?}",
                failed, total, self.threshold
            ),
        }
    }
}
