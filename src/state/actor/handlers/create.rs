//! Channel creation.
//!
//! Provisions the primary (and optional voice) channel, then records it.
//! A record is only inserted once every external resource exists; a failed
//! voice creation rolls back the primary channel.

use super::{BatchOutcome, CreationOutcome, LifecycleActor};
use crate::error::{LifecycleError, LifecycleResult};
use crate::messages;
use crate::platform::{ChannelKind, ChannelRef, Member, PlatformError, UserId};
use crate::policy::AllowanceClass;
use crate::state::ChannelRecord;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

impl LifecycleActor {
    pub(crate) async fn handle_create(
        &mut self,
        owner: Member,
        invitees: Vec<Member>,
        origin: Option<ChannelRef>,
        now: DateTime<Utc>,
    ) -> LifecycleResult<CreationOutcome> {
        if let Some(origin) = origin
            && self.is_private_channel(origin)
        {
            return Err(LifecycleError::WrongChannel);
        }

        self.ensure_vacant(owner.id).await?;

        let bot = self.platform.bot_user();
        let primary = self
            .provision(&owner, ChannelKind::Text, bot)
            .await
            .map_err(LifecycleError::CreationFailed)?;

        let secondary = if self.settings.with_voice {
            match self.provision(&owner, ChannelKind::Voice, bot).await {
                Ok(channel) => Some(channel),
                Err(e) => {
                    self.discard_channel(primary).await;
                    return Err(LifecycleError::CreationFailed(e));
                }
            }
        } else {
            None
        };

        let allowance = match self.settings.guild.sponsor_role {
            Some(role) if owner.has_role(role) => AllowanceClass::Sponsor,
            _ => AllowanceClass::Standard,
        };
        let expires_at = self.settings.policy.initial_deadline(now, allowance);
        let mut record = ChannelRecord::new(owner.id, primary, secondary, now, expires_at);
        record.allowance = allowance;

        self.registry.insert(record.clone())?;
        crate::metrics::inc_channels_created();
        crate::metrics::set_active_channels(self.registry.len());
        info!(
            owner = %owner.id,
            channel = %primary,
            voice = ?secondary,
            expires_at = %expires_at,
            "Private channel created"
        );
        self.checkpoint().await;

        self.post(primary, &messages::welcome(&self.settings.guild.name, expires_at))
            .await;

        let invites = if invitees.is_empty() {
            BatchOutcome::default()
        } else {
            let outcome = self.apply_batch(&record, &invitees, true).await;
            self.post(primary, &messages::invite_result(&outcome)).await;
            outcome
        };

        Ok(CreationOutcome { record, invites })
    }

    /// Fail with `AlreadyExists` if the owner still has a live channel.
    ///
    /// A record whose primary channel no longer exists on the platform is
    /// stale: it is purged (along with any surviving voice channel) and the
    /// owner is treated as vacant.
    async fn ensure_vacant(&mut self, owner: UserId) -> LifecycleResult<()> {
        let Some(existing) = self.registry.get(owner).cloned() else {
            return Ok(());
        };

        if self.platform.channel_exists(existing.primary).await {
            return Err(LifecycleError::AlreadyExists {
                channel: existing.primary,
            });
        }

        info!(owner = %owner, channel = %existing.primary, "Purging stale record");
        if let Some(voice) = existing.secondary {
            self.discard_channel(voice).await;
        }
        self.cancel_pending_delete(owner);
        self.registry.remove(owner);
        crate::metrics::set_active_channels(self.registry.len());
        self.checkpoint().await;
        Ok(())
    }

    async fn provision(
        &self,
        owner: &Member,
        kind: ChannelKind,
        bot: Option<UserId>,
    ) -> Result<ChannelRef, PlatformError> {
        let spec = self.settings.channel_spec(owner, kind, bot);
        self.platform.create_channel(&spec).await.inspect_err(|e| {
            crate::metrics::record_external_failure("create_channel");
            warn!(owner = %owner.id, kind = ?kind, error = %e, "Channel creation failed");
        })
    }

    /// Best-effort removal of a channel that has no record.
    async fn discard_channel(&self, channel: ChannelRef) {
        match self.platform.delete_channel(channel).await {
            Ok(()) => debug!(channel = %channel, "Discarded orphan channel"),
            Err(PlatformError::NotFound) => {}
            Err(e) => {
                crate::metrics::record_external_failure("delete_channel");
                warn!(channel = %channel, error = %e, "Failed to discard orphan channel");
            }
        }
    }
}
