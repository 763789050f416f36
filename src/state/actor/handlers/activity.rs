//! Activity signals from observed messages.

use super::LifecycleActor;
use crate::platform::ChannelRef;
use chrono::{DateTime, Utc};
use tracing::trace;

impl LifecycleActor {
    /// Slide the inactivity deadline for the record owning `channel`.
    ///
    /// Not checkpointed here; the next sweep flushes pending changes.
    pub(crate) fn handle_activity(&mut self, channel: ChannelRef, at: DateTime<Utc>) {
        let Some(record) = self.registry.find_by_channel(channel) else {
            return;
        };
        if record.secondary == Some(channel) && !self.settings.count_voice_activity {
            return;
        }

        let owner = record.owner;
        let seen = record.last_active_at;
        if let Some(deadline) = self
            .registry
            .record_activity(channel, at, &self.settings.policy)
        {
            trace!(owner = %owner, expires_at = %deadline, "Inactivity deadline moved");
        }
        if self
            .registry
            .get(owner)
            .is_some_and(|r| r.last_active_at > seen)
        {
            self.dirty = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::platform::{Member, UserId};
    use crate::policy::ExpiryPolicy;
    use crate::state::actor::tests_support::{actor_with_platform, actor_with_settings};
    use crate::state::settings::test_settings;
    use chrono::{DateTime, TimeDelta};

    #[tokio::test]
    async fn voice_activity_counts_only_when_enabled() {
        let mut settings = test_settings();
        settings.policy.kind = ExpiryPolicy::Inactivity;
        settings.with_voice = true;
        let (mut actor, _platform) = actor_with_settings(settings);

        let t0 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let created = actor
            .handle_create(Member::new(UserId(1), "alice"), vec![], None, t0)
            .await
            .unwrap();
        let voice = created.record.secondary.unwrap();

        actor.handle_activity(voice, t0 + TimeDelta::days(3));
        assert_eq!(
            actor.registry.get(UserId(1)).unwrap().expires_at,
            t0 + TimeDelta::days(7)
        );

        actor.handle_activity(created.record.primary, t0 + TimeDelta::days(3));
        assert_eq!(
            actor.registry.get(UserId(1)).unwrap().expires_at,
            t0 + TimeDelta::days(10)
        );
        assert!(actor.dirty);
    }

    #[tokio::test]
    async fn ttl_activity_is_still_flushed() {
        let (mut actor, _platform) = actor_with_platform();
        let t0 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let created = actor
            .handle_create(Member::new(UserId(1), "alice"), vec![], None, t0)
            .await
            .unwrap();
        actor.dirty = false;

        actor.handle_activity(created.record.primary, t0 + TimeDelta::hours(2));
        let record = actor.registry.get(UserId(1)).unwrap();
        assert_eq!(record.last_active_at, t0 + TimeDelta::hours(2));
        assert_eq!(record.expires_at, t0 + TimeDelta::hours(24));
        assert!(actor.dirty);

        // Older signals change nothing.
        actor.dirty = false;
        actor.handle_activity(created.record.primary, t0 + TimeDelta::hours(1));
        assert!(!actor.dirty);
    }
}
