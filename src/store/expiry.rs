//! Lease deadline index of a catalog.
//!
//! Two-way index: deadline→ids for ordered draining and id→deadline for
//! O(log N) rescheduling on renew. Deadlines use the monotonic clock.
//! An entry is expired once `now` is strictly past its deadline.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Default)]
pub(crate) struct ExpiryIndex {
    /// deadline -> ids expiring at that instant
    deadlines: BTreeMap<Instant, Vec<String>>,

    /// id -> deadline
    instance_to_deadline: HashMap<String, Instant>,
}

impl ExpiryIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Schedules `id`, replacing any previous deadline
    pub(crate) fn schedule(
        &mut self,
        id: &str,
        deadline: Instant,
    ) {
        self.cancel(id);
        self.deadlines.entry(deadline).or_default().push(id.to_string());
        self.instance_to_deadline.insert(id.to_string(), deadline);
    }

    pub(crate) fn cancel(
        &mut self,
        id: &str,
    ) {
        if let Some(deadline) = self.instance_to_deadline.remove(id) {
            if let Some(ids) = self.deadlines.get_mut(&deadline) {
                ids.retain(|i| i != id);
                if ids.is_empty() {
                    self.deadlines.remove(&deadline);
                }
            }
        }
    }

    /// Removes and returns every id whose deadline lies strictly before `now`
    pub(crate) fn drain_expired(
        &mut self,
        now: Instant,
    ) -> Vec<String> {
        let due: Vec<Instant> = self.deadlines.range(..now).map(|(deadline, _)| *deadline).collect();

        let mut expired = Vec::new();
        for deadline in due {
            if let Some(ids) = self.deadlines.remove(&deadline) {
                for id in &ids {
                    self.instance_to_deadline.remove(id);
                }
                expired.extend(ids);
            }
        }
        expired
    }

    /// O(1) peek at the earliest deadline
    pub(crate) fn may_have_expired(
        &self,
        now: Instant,
    ) -> bool {
        self.deadlines
            .keys()
            .next()
            .map(|earliest| *earliest < now)
            .unwrap_or(false)
    }

    pub(crate) fn deadline(
        &self,
        id: &str,
    ) -> Option<Instant> {
        self.instance_to_deadline.get(id).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.instance_to_deadline.len()
    }
}
