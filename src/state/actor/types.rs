use crate::error::LifecycleResult;
use crate::platform::{ChannelRef, Member, UserId};
use crate::state::ChannelRecord;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::oneshot;

/// Three-way partition of a batch invite/kick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub success: Vec<Member>,
    pub failed: Vec<Member>,
    /// Self, bots and moderators; never touched.
    pub ignored: Vec<Member>,
}

impl BatchOutcome {
    pub fn is_empty(&self) -> bool {
        self.success.is_empty() && self.failed.is_empty() && self.ignored.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationOutcome {
    pub record: ChannelRecord,
    /// Result of inviting the members named at creation.
    pub invites: BatchOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendOutcome {
    pub previous: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// Deletion will run after the grace delay.
    Scheduled {
        owner: UserId,
        channel: ChannelRef,
        grace: Duration,
        /// Names this particular deletion when cancelling it.
        token: u64,
    },
    /// The channel is already gone.
    Deleted { owner: UserId, channel: ChannelRef },
}

/// Why a channel was deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteReason {
    Manual,
    Forced,
    Expired,
}

impl DeleteReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Forced => "forced",
            Self::Expired => "expired",
        }
    }
}

/// Summary of one sweep tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub evaluated: usize,
    pub notices: Vec<UserId>,
    pub deleted: Vec<UserId>,
    /// Expired records whose deletion failed; retried next tick.
    pub failed: Vec<UserId>,
}

impl SweepReport {
    pub fn is_quiet(&self) -> bool {
        self.notices.is_empty() && self.deleted.is_empty() && self.failed.is_empty()
    }
}

/// How to look a record up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKey {
    Owner(UserId),
    Channel(ChannelRef),
}

/// Events that can be sent to the lifecycle actor.
#[derive(Debug)]
pub enum LifecycleEvent {
    Create {
        owner: Member,
        invitees: Vec<Member>,
        /// Channel the command was issued from.
        origin: Option<ChannelRef>,
        now: DateTime<Utc>,
        reply_tx: oneshot::Sender<LifecycleResult<CreationOutcome>>,
    },
    Invite {
        owner: UserId,
        targets: Vec<Member>,
        origin: Option<ChannelRef>,
        reply_tx: oneshot::Sender<LifecycleResult<BatchOutcome>>,
    },
    Kick {
        owner: UserId,
        targets: Vec<Member>,
        origin: Option<ChannelRef>,
        reply_tx: oneshot::Sender<LifecycleResult<BatchOutcome>>,
    },
    /// An invited member revokes their own access.
    Leave {
        member: Member,
        channel: ChannelRef,
        reply_tx: oneshot::Sender<LifecycleResult<UserId>>,
    },
    Extend {
        owner: UserId,
        now: DateTime<Utc>,
        reply_tx: oneshot::Sender<LifecycleResult<ExtendOutcome>>,
    },
    /// Confirmed manual delete, or admin override when `target` names
    /// another owner.
    Delete {
        requester: Member,
        target: Option<UserId>,
        origin: Option<ChannelRef>,
        reply_tx: oneshot::Sender<LifecycleResult<DeletionOutcome>>,
    },
    /// Abort a deletion that is still inside its grace delay.
    /// With a token, only the deletion it names is aborted.
    CancelDelete {
        owner: UserId,
        token: Option<u64>,
        reply_tx: oneshot::Sender<bool>,
    },
    /// Fired by the deferred-delete timer.
    FinishDelete { owner: UserId, token: u64 },
    Activity {
        channel: ChannelRef,
        at: DateTime<Utc>,
    },
    Sweep {
        now: DateTime<Utc>,
        reply_tx: oneshot::Sender<SweepReport>,
    },
    Lookup {
        key: LookupKey,
        reply_tx: oneshot::Sender<Option<ChannelRecord>>,
    },
    Snapshot {
        reply_tx: oneshot::Sender<Vec<ChannelRecord>>,
    },
}
