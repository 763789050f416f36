//! Manual, forced and deferred deletion.
//!
//! A confirmed manual delete issued from inside the channel moves the record
//! to `PendingDelete` and arms a timer task; the timer posts `FinishDelete`
//! back into the mailbox, where the record is re-checked before anything is
//! removed. Forced deletes (admin override, sweep) skip the grace delay.

use super::{DeleteReason, DeletionOutcome, LifecycleActor, LifecycleEvent, PendingDelete};
use crate::error::{LifecycleError, LifecycleResult};
use crate::messages;
use crate::platform::{ChannelRef, Member, PlatformError, UserId};
use crate::state::{ChannelRecord, ChannelState};
use std::time::Duration;
use tracing::{debug, info, warn};

impl LifecycleActor {
    pub(crate) async fn handle_delete(
        &mut self,
        requester: Member,
        target: Option<UserId>,
        origin: Option<ChannelRef>,
    ) -> LifecycleResult<DeletionOutcome> {
        let owner = target.unwrap_or(requester.id);
        let is_admin = self.settings.guild.is_admin(&requester);
        let overriding = owner != requester.id;
        if overriding && !is_admin {
            return Err(LifecycleError::Unauthorized);
        }

        let record = self
            .registry
            .get(owner)
            .cloned()
            .ok_or(LifecycleError::NotFound)?;

        // Issued from somebody else's private channel.
        if let Some(origin) = origin
            && !record.owns_channel(origin)
            && self.is_private_channel(origin)
            && !is_admin
        {
            return Err(LifecycleError::Unauthorized);
        }

        if overriding {
            info!(admin = %requester.id, owner = %owner, "Admin override delete");
            self.force_delete(owner, DeleteReason::Forced).await?;
            return Ok(DeletionOutcome::Deleted {
                owner,
                channel: record.primary,
            });
        }

        if let Some(pending) = self.pending_deletes.get(&owner) {
            return Ok(DeletionOutcome::Scheduled {
                owner,
                channel: record.primary,
                grace: pending.grace,
                token: pending.token,
            });
        }

        let in_channel = origin.is_some_and(|o| record.owns_channel(o));
        let grace = if in_channel {
            self.settings.delete_grace
        } else {
            Duration::ZERO
        };

        self.registry.set_state(owner, ChannelState::PendingDelete);
        let Some(token) = self.schedule_delete(owner, grace) else {
            self.registry.set_state(owner, ChannelState::Active);
            return Err(LifecycleError::ActorGone);
        };
        if in_channel {
            self.post(record.primary, &messages::deleting_soon(grace))
                .await;
        }

        info!(owner = %owner, channel = %record.primary, grace_secs = grace.as_secs(), "Deletion scheduled");
        Ok(DeletionOutcome::Scheduled {
            owner,
            channel: record.primary,
            grace,
            token,
        })
    }

    /// Arm the grace timer and return its token. `None` when the actor is
    /// shutting down.
    fn schedule_delete(&mut self, owner: UserId, grace: Duration) -> Option<u64> {
        let mailbox = self.mailbox.upgrade()?;
        self.next_token += 1;
        let token = self.next_token;

        let timer = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = mailbox
                .send(LifecycleEvent::FinishDelete { owner, token })
                .await;
        });

        let pending = PendingDelete {
            token,
            grace,
            timer: timer.abort_handle(),
        };
        if let Some(previous) = self.pending_deletes.insert(owner, pending) {
            previous.timer.abort();
        }
        Some(token)
    }

    /// Abort a scheduled deletion and return the record to `Active`.
    ///
    /// A `token` restricts this to the deletion it was issued for; a later
    /// deletion of the same owner is left alone.
    pub(crate) fn handle_cancel_delete(&mut self, owner: UserId, token: Option<u64>) -> bool {
        let matches = self
            .pending_deletes
            .get(&owner)
            .is_some_and(|p| token.is_none_or(|t| p.token == t));
        if !matches || !self.cancel_pending_delete(owner) {
            return false;
        }
        if self
            .registry
            .get(owner)
            .is_some_and(ChannelRecord::is_pending_delete)
        {
            self.registry.set_state(owner, ChannelState::Active);
        }
        info!(owner = %owner, "Scheduled deletion cancelled");
        true
    }

    pub(crate) fn cancel_pending_delete(&mut self, owner: UserId) -> bool {
        match self.pending_deletes.remove(&owner) {
            Some(pending) => {
                pending.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Runs when a grace timer fires.
    ///
    /// No-op unless the token still matches and the record is still
    /// pending; the sweep may have removed it in the meantime.
    pub(crate) async fn handle_finish_delete(&mut self, owner: UserId, token: u64) {
        match self.pending_deletes.get(&owner) {
            Some(pending) if pending.token == token => {
                self.pending_deletes.remove(&owner);
            }
            _ => {
                debug!(owner = %owner, token, "Stale deletion timer ignored");
                return;
            }
        }

        if !self
            .registry
            .get(owner)
            .is_some_and(ChannelRecord::is_pending_delete)
        {
            debug!(owner = %owner, "Record no longer pending deletion");
            return;
        }

        if let Err(e) = self.force_delete(owner, DeleteReason::Manual).await {
            warn!(owner = %owner, error = %e, "Deferred deletion failed; record kept");
            self.registry.set_state(owner, ChannelState::Active);
        }
    }

    /// Remove the owner's channels, then the record. The removed record is
    /// returned in its terminal `Deleted` state.
    ///
    /// A channel that is already gone counts as removed. Any other platform
    /// failure leaves the record in place so a later sweep or retry can
    /// finish the job.
    pub(crate) async fn force_delete(
        &mut self,
        owner: UserId,
        reason: DeleteReason,
    ) -> LifecycleResult<ChannelRecord> {
        let record = self
            .registry
            .get(owner)
            .cloned()
            .ok_or(LifecycleError::NotFound)?;

        for channel in record.channels() {
            match self.platform.delete_channel(channel).await {
                Ok(()) => {}
                Err(PlatformError::NotFound) => {
                    debug!(owner = %owner, channel = %channel, "Channel already gone");
                }
                Err(e) => {
                    crate::metrics::record_external_failure("delete_channel");
                    warn!(owner = %owner, channel = %channel, error = %e, "Channel deletion failed");
                    return Err(LifecycleError::External(e));
                }
            }
        }

        self.cancel_pending_delete(owner);
        let mut removed = self.registry.remove(owner).unwrap_or(record);
        removed.state = ChannelState::Deleted;
        crate::metrics::record_deletion(reason.as_str());
        crate::metrics::set_active_channels(self.registry.len());
        info!(owner = %owner, channel = %removed.primary, reason = reason.as_str(), "Private channel deleted");
        self.checkpoint().await;
        Ok(removed)
    }
}
