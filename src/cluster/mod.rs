//! Cluster membership seam consumed by the replication transport.
//!
//! Discovery itself is external: the transport only needs to enumerate
//! members, be told about joins/leaves, and announce its own presence.
//! [`StaticMembership`] is an in-process backend used by the binary
//! (fixed peer list) and by tests.
mod member;
mod static_membership;
pub use member::*;
pub use static_membership::*;

use std::sync::Arc;

use crate::Result;

/// Receives membership change notifications
pub trait MembershipListener: Send + Sync + 'static {
    /// Invoked when a member joins the cluster
    fn on_join(
        &self,
        member: &Member,
    );

    /// Invoked when a member leaves the cluster
    fn on_leave(
        &self,
        member: &Member,
    );
}

/// Read side of the cluster membership
pub trait Membership: Send + Sync + 'static {
    /// Snapshot of the currently known members (self included once joined)
    fn members(&self) -> Vec<Member>;

    fn register_listener(
        &self,
        listener: Arc<dyn MembershipListener>,
    );
}

/// Announces the local member to the cluster
pub trait Registrator: Send + Sync + 'static {
    fn self_member(&self) -> Member;

    fn join(&self) -> Result<()>;

    fn leave(&self) -> Result<()>;
}
