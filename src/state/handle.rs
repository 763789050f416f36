//! Public entry point into the lifecycle actor.
//!
//! `LifecycleHandle` is cheap to clone and is shared by the command layer
//! and the sweep scheduler. Every call is a message to the actor plus a
//! oneshot reply, so all mutations are serialized.

use super::actor::{
    BatchOutcome, CreationOutcome, DeletionOutcome, ExtendOutcome, LifecycleActor,
    LifecycleEvent, LookupKey, SweepReport,
};
use super::settings::LifecycleSettings;
use super::{ChannelRecord, Registry};
use crate::clock::Clock;
use crate::error::{LifecycleError, LifecycleResult};
use crate::persistence::CheckpointStore;
use crate::platform::{ChannelRef, Member, PlatformClient, UserId};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

#[derive(Clone)]
pub struct LifecycleHandle {
    tx: mpsc::Sender<LifecycleEvent>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for LifecycleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl LifecycleHandle {
    /// Spawn the actor around `registry` and return a handle to it.
    pub fn spawn(
        registry: Registry,
        platform: Arc<dyn PlatformClient>,
        store: Arc<dyn CheckpointStore>,
        settings: Arc<LifecycleSettings>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tx = LifecycleActor::spawn(registry, platform, store, settings);
        Self { tx, clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> LifecycleEvent,
    ) -> LifecycleResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| LifecycleError::ActorGone)?;
        reply_rx.await.map_err(|_| LifecycleError::ActorGone)
    }

    /// Create a private channel for `owner`, granting `invitees` access.
    pub async fn handle_create(
        &self,
        owner: Member,
        invitees: Vec<Member>,
        origin: Option<ChannelRef>,
    ) -> LifecycleResult<CreationOutcome> {
        let now = self.now();
        self.request(|reply_tx| LifecycleEvent::Create {
            owner,
            invitees,
            origin,
            now,
            reply_tx,
        })
        .await?
    }

    /// Delete the requester's channel, or `target`'s with admin rights.
    ///
    /// Callers go through [`super::DeleteConfirmations`] first.
    pub async fn handle_delete(
        &self,
        requester: Member,
        target: Option<UserId>,
        origin: Option<ChannelRef>,
    ) -> LifecycleResult<DeletionOutcome> {
        self.request(|reply_tx| LifecycleEvent::Delete {
            requester,
            target,
            origin,
            reply_tx,
        })
        .await?
    }

    pub async fn handle_invite(
        &self,
        owner: UserId,
        targets: Vec<Member>,
        origin: Option<ChannelRef>,
    ) -> LifecycleResult<BatchOutcome> {
        self.request(|reply_tx| LifecycleEvent::Invite {
            owner,
            targets,
            origin,
            reply_tx,
        })
        .await?
    }

    pub async fn handle_kick(
        &self,
        owner: UserId,
        targets: Vec<Member>,
        origin: Option<ChannelRef>,
    ) -> LifecycleResult<BatchOutcome> {
        self.request(|reply_tx| LifecycleEvent::Kick {
            owner,
            targets,
            origin,
            reply_tx,
        })
        .await?
    }

    pub async fn handle_leave(&self, member: Member, channel: ChannelRef) -> LifecycleResult<UserId> {
        self.request(|reply_tx| LifecycleEvent::Leave {
            member,
            channel,
            reply_tx,
        })
        .await?
    }

    pub async fn handle_extend(&self, owner: UserId, now: DateTime<Utc>) -> LifecycleResult<ExtendOutcome> {
        self.request(|reply_tx| LifecycleEvent::Extend {
            owner,
            now,
            reply_tx,
        })
        .await?
    }

    /// Abort a deletion still inside its grace delay.
    pub async fn cancel_delete(&self, owner: UserId) -> LifecycleResult<bool> {
        self.request(|reply_tx| LifecycleEvent::CancelDelete {
            owner,
            token: None,
            reply_tx,
        })
        .await
    }

    /// Abort the deletion identified by `token`, if it is still pending.
    pub async fn cancel_scheduled(&self, owner: UserId, token: u64) -> LifecycleResult<bool> {
        self.request(|reply_tx| LifecycleEvent::CancelDelete {
            owner,
            token: Some(token),
            reply_tx,
        })
        .await
    }

    /// Report a message observed in `channel`.
    pub async fn record_activity(&self, channel: ChannelRef, at: DateTime<Utc>) -> LifecycleResult<()> {
        self.tx
            .send(LifecycleEvent::Activity { channel, at })
            .await
            .map_err(|_| LifecycleError::ActorGone)
    }

    pub async fn sweep(&self, now: DateTime<Utc>) -> LifecycleResult<SweepReport> {
        self.request(|reply_tx| LifecycleEvent::Sweep { now, reply_tx })
            .await
    }

    pub async fn lookup_owner(&self, owner: UserId) -> LifecycleResult<Option<ChannelRecord>> {
        self.request(|reply_tx| LifecycleEvent::Lookup {
            key: LookupKey::Owner(owner),
            reply_tx,
        })
        .await
    }

    pub async fn lookup_channel(&self, channel: ChannelRef) -> LifecycleResult<Option<ChannelRecord>> {
        self.request(|reply_tx| LifecycleEvent::Lookup {
            key: LookupKey::Channel(channel),
            reply_tx,
        })
        .await
    }

    pub async fn snapshot(&self) -> LifecycleResult<Vec<ChannelRecord>> {
        self.request(|reply_tx| LifecycleEvent::Snapshot { reply_tx })
            .await
    }
}
