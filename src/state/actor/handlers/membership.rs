//! Invite, kick and leave.
//!
//! These never change a record; they only grant or revoke platform access.

use super::{BatchOutcome, LifecycleActor};
use crate::error::{LifecycleError, LifecycleResult};
use crate::messages;
use crate::platform::{ChannelRef, Member, UserId};
use crate::state::{ChannelRecord, ChannelState};
use tracing::{info, warn};

impl LifecycleActor {
    /// Active record for `owner`. Records waiting out a delete are treated
    /// as gone.
    pub(crate) fn live_record(&self, owner: UserId) -> LifecycleResult<ChannelRecord> {
        self.registry
            .get(owner)
            .filter(|r| r.state == ChannelState::Active)
            .cloned()
            .ok_or(LifecycleError::NotFound)
    }

    /// Invitations are issued from outside any private channel.
    pub(crate) async fn handle_invite(
        &mut self,
        owner: UserId,
        targets: Vec<Member>,
        origin: Option<ChannelRef>,
    ) -> LifecycleResult<BatchOutcome> {
        if let Some(origin) = origin
            && self.is_private_channel(origin)
        {
            return Err(LifecycleError::WrongChannel);
        }
        let record = self.live_record(owner)?;

        let outcome = self.apply_batch(&record, &targets, true).await;
        info!(
            owner = %owner,
            success = outcome.success.len(),
            failed = outcome.failed.len(),
            ignored = outcome.ignored.len(),
            "Invite processed"
        );
        self.post(record.primary, &messages::invite_result(&outcome))
            .await;
        Ok(outcome)
    }

    /// Kicks are issued from inside the owner's own channel.
    pub(crate) async fn handle_kick(
        &mut self,
        owner: UserId,
        targets: Vec<Member>,
        origin: Option<ChannelRef>,
    ) -> LifecycleResult<BatchOutcome> {
        let record = self.live_record(owner)?;
        if !origin.is_some_and(|o| record.owns_channel(o)) {
            return Err(LifecycleError::WrongChannel);
        }

        let outcome = self.apply_batch(&record, &targets, false).await;
        info!(
            owner = %owner,
            success = outcome.success.len(),
            failed = outcome.failed.len(),
            ignored = outcome.ignored.len(),
            "Kick processed"
        );
        self.post(record.primary, &messages::kick_result(&outcome))
            .await;
        Ok(outcome)
    }

    /// An invited member drops their own access. Returns the channel owner.
    pub(crate) async fn handle_leave(
        &mut self,
        member: Member,
        channel: ChannelRef,
    ) -> LifecycleResult<UserId> {
        let record = self
            .registry
            .find_by_channel(channel)
            .cloned()
            .ok_or(LifecycleError::NotFound)?;
        if record.owner == member.id {
            return Err(LifecycleError::OwnerCannotLeave);
        }

        for ch in record.channels() {
            if let Err(e) = self.platform.set_permission(ch, member.id, false).await {
                crate::metrics::record_external_failure("set_permission");
                warn!(member = %member.id, channel = %ch, error = %e, "Leave failed");
                return Err(LifecycleError::External(e));
            }
        }

        info!(member = %member.id, owner = %record.owner, "Member left private channel");
        self.post(record.primary, &messages::member_left(&member.display_name))
            .await;
        Ok(record.owner)
    }
}
