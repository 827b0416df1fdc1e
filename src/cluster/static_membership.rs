use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use tracing::info;

use super::Member;
use super::MemberId;
use super::Membership;
use super::MembershipListener;
use super::Registrator;
use crate::Result;

/// Shared in-memory membership backend.
///
/// Every registry process holding the same `Arc<StaticMembership>` observes
/// the same member set. Listeners are notified outside of the member lock.
#[derive(Default)]
pub struct StaticMembership {
    members: RwLock<BTreeMap<MemberId, Member>>,
    listeners: RwLock<Vec<Arc<dyn MembershipListener>>>,
}

impl StaticMembership {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seeds the backend with already-running peers, without notifying anyone
    pub fn with_members(members: Vec<Member>) -> Arc<Self> {
        let membership = Self::default();
        {
            let mut guard = membership.members.write();
            for member in members {
                guard.insert(member.id.clone(), member);
            }
        }
        Arc::new(membership)
    }

    /// Adds (or refreshes) a member and notifies listeners
    pub fn add(
        &self,
        member: Member,
    ) {
        info!(member = %member, "Member joined");
        self.members.write().insert(member.id.clone(), member.clone());
        for listener in self.listeners_snapshot() {
            listener.on_join(&member);
        }
    }

    /// Removes a member and notifies listeners; unknown ids are ignored
    pub fn remove(
        &self,
        id: &MemberId,
    ) -> Option<Member> {
        let removed = self.members.write().remove(id);
        if let Some(member) = &removed {
            info!(member = %member, "Member left");
            for listener in self.listeners_snapshot() {
                listener.on_leave(member);
            }
        } else {
            debug!(member = %id, "Leave of unknown member ignored");
        }
        removed
    }

    pub fn registrator(
        self: &Arc<Self>,
        member: Member,
    ) -> Arc<StaticRegistrator> {
        Arc::new(StaticRegistrator {
            membership: self.clone(),
            member,
        })
    }

    fn listeners_snapshot(&self) -> Vec<Arc<dyn MembershipListener>> {
        self.listeners.read().clone()
    }
}

impl Membership for StaticMembership {
    fn members(&self) -> Vec<Member> {
        self.members.read().values().cloned().collect()
    }

    fn register_listener(
        &self,
        listener: Arc<dyn MembershipListener>,
    ) {
        self.listeners.write().push(listener);
    }
}

/// Registrator bound to one member of a [`StaticMembership`]
pub struct StaticRegistrator {
    membership: Arc<StaticMembership>,
    member: Member,
}

impl Registrator for StaticRegistrator {
    fn self_member(&self) -> Member {
        self.member.clone()
    }

    fn join(&self) -> Result<()> {
        self.membership.add(self.member.clone());
        Ok(())
    }

    fn leave(&self) -> Result<()> {
        self.membership.remove(&self.member.id);
        Ok(())
    }
}
