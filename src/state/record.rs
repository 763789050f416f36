//! Private channel record.

use crate::platform::{ChannelRef, UserId};
use crate::policy::AllowanceClass;
use chrono::{DateTime, Utc};

/// Lifecycle state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Active,
    /// Manual deletion confirmed; waiting out the grace delay.
    PendingDelete,
    /// Terminal. Only carried by the record handed back after removal;
    /// never stored in the registry.
    Deleted,
}

/// Bookkeeping for one live private channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    pub owner: UserId,
    pub primary: ChannelRef,
    /// Paired voice channel, when provisioned.
    pub secondary: Option<ChannelRef>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub notice_sent: bool,
    pub allowance: AllowanceClass,
    pub state: ChannelState,
}

impl ChannelRecord {
    pub fn new(
        owner: UserId,
        primary: ChannelRef,
        secondary: Option<ChannelRef>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            owner,
            primary,
            secondary,
            created_at,
            last_active_at: created_at,
            expires_at,
            notice_sent: false,
            allowance: AllowanceClass::Standard,
            state: ChannelState::Active,
        }
    }

    /// Primary channel first, then the secondary one if any.
    pub fn channels(&self) -> impl Iterator<Item = ChannelRef> + '_ {
        std::iter::once(self.primary).chain(self.secondary)
    }

    pub fn owns_channel(&self, channel: ChannelRef) -> bool {
        self.primary == channel || self.secondary == Some(channel)
    }

    pub fn is_pending_delete(&self) -> bool {
        self.state == ChannelState::PendingDelete
    }
}
