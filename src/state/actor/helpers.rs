use super::{BatchOutcome, LifecycleActor};
use crate::platform::{ChannelRef, Member, UserId};
use crate::state::settings::GuildScope;
use crate::state::ChannelRecord;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Why a batch target was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IgnoreReason {
    SelfTarget,
    Bot,
    Moderator,
}

/// Owners never act on themselves, bots, or moderator-exempt members.
pub(crate) fn ignore_reason(owner: UserId, target: &Member, guild: &GuildScope) -> Option<IgnoreReason> {
    if target.id == owner {
        Some(IgnoreReason::SelfTarget)
    } else if target.is_bot {
        Some(IgnoreReason::Bot)
    } else if guild.is_moderator(target) {
        Some(IgnoreReason::Moderator)
    } else {
        None
    }
}

impl LifecycleActor {
    pub(crate) fn is_private_channel(&self, channel: ChannelRef) -> bool {
        self.registry.find_by_channel(channel).is_some()
    }

    /// Post to a channel. Delivery failures are logged, never propagated.
    pub(crate) async fn post(&self, channel: ChannelRef, content: &str) {
        if let Err(e) = self.platform.send_message(channel, content).await {
            crate::metrics::record_external_failure("send_message");
            warn!(channel = %channel, error = %e, "Failed to post message");
        }
    }

    /// Grant (`allow`) or revoke access on every channel of `record` for
    /// each target, partitioning the targets into success/failed/ignored.
    pub(crate) async fn apply_batch(
        &self,
        record: &ChannelRecord,
        targets: &[Member],
        allow: bool,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut seen = HashSet::new();

        for target in targets {
            if !seen.insert(target.id) {
                continue;
            }
            if let Some(reason) = ignore_reason(record.owner, target, &self.settings.guild) {
                debug!(owner = %record.owner, target = %target.id, ?reason, "Ignoring batch target");
                outcome.ignored.push(target.clone());
                continue;
            }

            let mut granted = true;
            for channel in record.channels() {
                if let Err(e) = self.platform.set_permission(channel, target.id, allow).await {
                    crate::metrics::record_external_failure("set_permission");
                    warn!(
                        owner = %record.owner,
                        target = %target.id,
                        channel = %channel,
                        allow,
                        error = %e,
                        "Permission change failed"
                    );
                    granted = false;
                    break;
                }
            }

            if granted {
                outcome.success.push(target.clone());
            } else {
                outcome.failed.push(target.clone());
            }
        }

        outcome
    }
}
