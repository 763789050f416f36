//! Channel registry.
//!
//! The authoritative owner → record mapping, plus a reverse index from
//! channel handle to owner so commands issued from inside a private channel
//! can find its record. The registry itself performs no I/O; the lifecycle
//! actor is its only writer.

use super::record::{ChannelRecord, ChannelState};
use crate::error::{LifecycleError, LifecycleResult};
use crate::platform::{ChannelRef, UserId};
use crate::policy::{AllowanceClass, LifecyclePolicy};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct Registry {
    records: HashMap<UserId, ChannelRecord>,
    by_channel: HashMap<ChannelRef, UserId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, owner: UserId) -> Option<&ChannelRecord> {
        self.records.get(&owner)
    }

    /// Reverse lookup by primary or secondary channel.
    pub fn find_by_channel(&self, channel: ChannelRef) -> Option<&ChannelRecord> {
        self.by_channel
            .get(&channel)
            .and_then(|owner| self.records.get(owner))
    }

    /// Insert a new record.
    ///
    /// Fails with `AlreadyExists` if the owner already has a record. Stale
    /// records must be purged with [`Registry::remove`] before retrying.
    pub fn insert(&mut self, record: ChannelRecord) -> LifecycleResult<()> {
        if let Some(existing) = self.records.get(&record.owner) {
            return Err(LifecycleError::AlreadyExists {
                channel: existing.primary,
            });
        }
        for channel in record.channels() {
            self.by_channel.insert(channel, record.owner);
        }
        self.records.insert(record.owner, record);
        Ok(())
    }

    /// Remove the owner's record. Removing an absent owner is a no-op.
    pub fn remove(&mut self, owner: UserId) -> Option<ChannelRecord> {
        let record = self.records.remove(&owner)?;
        for channel in record.channels() {
            self.by_channel.remove(&channel);
        }
        Some(record)
    }

    /// Push the owner's deadline out by the extension window.
    ///
    /// Only allowed once the record has entered its final extension window;
    /// the deadline never moves earlier. A successful extension re-arms the
    /// expiry notice.
    pub fn extend(
        &mut self,
        owner: UserId,
        now: DateTime<Utc>,
        policy: &LifecyclePolicy,
    ) -> LifecycleResult<DateTime<Utc>> {
        let record = self
            .records
            .get_mut(&owner)
            .filter(|r| r.state == ChannelState::Active)
            .ok_or(LifecycleError::NotFound)?;

        let extended = policy
            .try_extend(record.expires_at, now)
            .map_err(|eligible_at| LifecycleError::TooEarly { eligible_at })?;

        record.expires_at = extended;
        record.notice_sent = false;
        Ok(extended)
    }

    /// Flip `notice_sent` to true. Returns `false` if it was already set or
    /// the owner has no record.
    pub fn mark_notice_sent(&mut self, owner: UserId) -> bool {
        match self.records.get_mut(&owner) {
            Some(record) if !record.notice_sent => {
                record.notice_sent = true;
                true
            }
            _ => false,
        }
    }

    pub fn set_state(&mut self, owner: UserId, state: ChannelState) -> bool {
        match self.records.get_mut(&owner) {
            Some(record) => {
                record.state = state;
                true
            }
            None => false,
        }
    }

    /// Record activity observed in `channel` at `at`.
    ///
    /// Under an activity-based policy the deadline slides forward (never
    /// backward) and the expiry notice is re-armed. Returns the new deadline
    /// when it moved.
    pub fn record_activity(
        &mut self,
        channel: ChannelRef,
        at: DateTime<Utc>,
        policy: &LifecyclePolicy,
    ) -> Option<DateTime<Utc>> {
        let owner = *self.by_channel.get(&channel)?;
        let record = self.records.get_mut(&owner)?;
        if at > record.last_active_at {
            record.last_active_at = at;
        }
        let deadline = policy.activity_deadline(record.last_active_at, record.allowance)?;
        if deadline > record.expires_at {
            record.expires_at = deadline;
            record.notice_sent = false;
            Some(deadline)
        } else {
            None
        }
    }

    /// Update the owner's allowance class; the deadline only ever grows.
    pub fn apply_allowance(
        &mut self,
        owner: UserId,
        class: AllowanceClass,
        policy: &LifecyclePolicy,
    ) -> bool {
        let Some(record) = self.records.get_mut(&owner) else {
            return false;
        };
        if record.allowance == class {
            return false;
        }
        record.allowance = class;
        if let Some(deadline) = policy.activity_deadline(record.last_active_at, class)
            && deadline > record.expires_at
        {
            record.expires_at = deadline;
            record.notice_sent = false;
        }
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelRecord> {
        self.records.values()
    }

    /// Clone every record so callers can iterate without borrowing the registry.
    pub fn snapshot(&self) -> Vec<ChannelRecord> {
        self.records.values().cloned().collect()
    }
}
