//! Peer-to-peer replication transport.
//!
//! Every member runs a [`ReplicationServer`]: an HTTP listener streaming
//! server-sent events to its peers, plus one long-lived client per peer
//! reading theirs. Catalog mutations enter through per-namespace
//! [`Replicator`]s; peer messages come out of the notification channel.
mod client;
mod codec;
mod health;
mod message;
mod replicator;
mod server;
mod sync_client;

pub(crate) use client::*;
pub use codec::*;
pub use health::*;
pub use message::*;
pub use replicator::*;
pub use server::*;
pub(crate) use sync_client::*;

#[cfg(test)]
mod replicator_test;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Namespace;
use crate::Result;

/// A fresh channel handed out per inbound sync request; the catalog layer
/// writes a register message per live instance and then drops it.
pub type SyncRequest = mpsc::Sender<OutMessage>;

/// Transport seam used by the catalog layer
#[async_trait]
pub trait Replication: Send + Sync + 'static {
    /// Creates the replicator of `namespace`; fails if it already exists
    fn get_replicator(
        &self,
        namespace: &Namespace,
    ) -> Result<Arc<dyn Replicator>>;

    /// Messages received from peers. Yields `Some` only on the first call.
    fn notifications(&self) -> Option<mpsc::Receiver<InMessage>>;

    /// Pulls the full state of one peer, waiting up to `wait` for a peer to
    /// answer, then starts serving. The channel closes once done.
    fn sync(
        &self,
        wait: Duration,
    ) -> mpsc::Receiver<InMessage>;

    /// Sync requests of joining peers. Yields `Some` only on the first call.
    fn sync_requests(&self) -> Option<mpsc::Receiver<SyncRequest>>;

    /// Leaves the cluster and releases listener and peer connections
    async fn stop(&self);
}
