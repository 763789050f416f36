//! Actor Model for Private Channel Lifecycle Management.
//!
//! This module implements the `LifecycleActor`, which owns the [`Registry`]
//! in an isolated Tokio task. It is the single writer: every create, invite,
//! kick, extend, delete and sweep is an event in its mailbox, processed one
//! at a time, so the command path and the periodic sweep never observe a
//! half-applied change.
//!
//! # Architecture
//!
//! - **State Ownership**: The actor owns the registry and the deferred-delete timers.
//! - **Message Passing**: Callers send `LifecycleEvent`s and await a oneshot reply.
//! - **Deferred Deletes**: The grace delay runs on a separate timer task that
//!   posts `FinishDelete` back into the mailbox; the actor never sleeps.

use crate::persistence::{CheckpointStore, PersistedRecord};
use crate::platform::{PlatformClient, UserId};
use crate::state::settings::LifecycleSettings;
use crate::state::Registry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

mod handlers;
mod helpers;
mod types;

pub use types::*;

/// Mailbox depth. Commands are low-volume; this only absorbs bursts.
const MAILBOX_CAPACITY: usize = 256;

/// A scheduled manual deletion waiting out its grace delay.
struct PendingDelete {
    token: u64,
    grace: Duration,
    timer: AbortHandle,
}

/// The Lifecycle Actor.
///
/// Owns the registry and processes lifecycle events sequentially.
pub struct LifecycleActor {
    registry: Registry,
    platform: Arc<dyn PlatformClient>,
    store: Arc<dyn CheckpointStore>,
    settings: Arc<LifecycleSettings>,
    pending_deletes: HashMap<UserId, PendingDelete>,
    next_token: u64,
    /// Registry changed since the last checkpoint.
    dirty: bool,
    mailbox: mpsc::WeakSender<LifecycleEvent>,
}

impl LifecycleActor {
    /// Create a new Lifecycle Actor around a (possibly restored) registry and spawn it.
    pub fn spawn(
        registry: Registry,
        platform: Arc<dyn PlatformClient>,
        store: Arc<dyn CheckpointStore>,
        settings: Arc<LifecycleSettings>,
    ) -> mpsc::Sender<LifecycleEvent> {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);

        crate::metrics::set_active_channels(registry.len());

        let actor = Self {
            registry,
            platform,
            store,
            settings,
            pending_deletes: HashMap::new(),
            next_token: 0,
            dirty: false,
            mailbox: tx.downgrade(),
        };

        tokio::spawn(async move {
            actor.run(rx).await;
        });

        tx
    }

    /// The main actor loop. Ends once every handle has been dropped.
    pub async fn run(mut self, mut rx: mpsc::Receiver<LifecycleEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle_event(event).await;
        }
        for (_, pending) in self.pending_deletes.drain() {
            pending.timer.abort();
        }
        debug!("Lifecycle actor stopped");
    }

    async fn handle_event(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Create {
                owner,
                invitees,
                origin,
                now,
                reply_tx,
            } => {
                let result = self.handle_create(owner, invitees, origin, now).await;
                let _ = reply_tx.send(result);
            }
            LifecycleEvent::Invite {
                owner,
                targets,
                origin,
                reply_tx,
            } => {
                let result = self.handle_invite(owner, targets, origin).await;
                let _ = reply_tx.send(result);
            }
            LifecycleEvent::Kick {
                owner,
                targets,
                origin,
                reply_tx,
            } => {
                let result = self.handle_kick(owner, targets, origin).await;
                let _ = reply_tx.send(result);
            }
            LifecycleEvent::Leave {
                member,
                channel,
                reply_tx,
            } => {
                let result = self.handle_leave(member, channel).await;
                let _ = reply_tx.send(result);
            }
            LifecycleEvent::Extend {
                owner,
                now,
                reply_tx,
            } => {
                let result = self.handle_extend(owner, now).await;
                let _ = reply_tx.send(result);
            }
            LifecycleEvent::Delete {
                requester,
                target,
                origin,
                reply_tx,
            } => {
                let result = self.handle_delete(requester, target, origin).await;
                let _ = reply_tx.send(result);
            }
            LifecycleEvent::CancelDelete {
                owner,
                token,
                reply_tx,
            } => {
                let _ = reply_tx.send(self.handle_cancel_delete(owner, token));
            }
            LifecycleEvent::FinishDelete { owner, token } => {
                self.handle_finish_delete(owner, token).await;
            }
            LifecycleEvent::Activity { channel, at } => {
                self.handle_activity(channel, at);
            }
            LifecycleEvent::Sweep { now, reply_tx } => {
                let report = self.handle_sweep(now).await;
                let _ = reply_tx.send(report);
            }
            LifecycleEvent::Lookup { key, reply_tx } => {
                let record = match key {
                    LookupKey::Owner(owner) => self.registry.get(owner),
                    LookupKey::Channel(channel) => self.registry.find_by_channel(channel),
                };
                let _ = reply_tx.send(record.cloned());
            }
            LifecycleEvent::Snapshot { reply_tx } => {
                let _ = reply_tx.send(self.registry.snapshot());
            }
        }
    }

    /// Write the whole registry to the checkpoint store.
    ///
    /// Failures are logged; the in-memory registry stays authoritative and
    /// the next mutation retries the write.
    async fn checkpoint(&mut self) {
        let records: Vec<PersistedRecord> = self.registry.iter().map(PersistedRecord::from).collect();
        match self.store.save(&records).await {
            Ok(()) => self.dirty = false,
            Err(e) => {
                self.dirty = true;
                warn!(error = %e, records = records.len(), "Failed to write registry checkpoint");
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::tests_support::actor_with_platform;
    use crate::error::LifecycleError;
    use crate::platform::{ChannelRef, Member, PlatformClient, UserId};
    use crate::state::ChannelState;
    use chrono::DateTime;

    #[tokio::test]
    async fn test_create_then_duplicate_is_rejected() {
        let (mut actor, _platform) = actor_with_platform();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let alice = Member::new(UserId(1), "alice");

        let outcome = actor
            .handle_create(alice.clone(), vec![], None, now)
            .await
            .unwrap();
        let err = actor
            .handle_create(alice, vec![], None, now)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LifecycleError::AlreadyExists {
                channel: outcome.record.primary
            }
        );
    }

    #[tokio::test]
    async fn test_stale_record_is_purged_on_create() {
        let (mut actor, platform) = actor_with_platform();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let alice = Member::new(UserId(1), "alice");

        let first = actor
            .handle_create(alice.clone(), vec![], None, now)
            .await
            .unwrap();
        platform.vanish(first.record.primary);

        let second = actor
            .handle_create(alice, vec![], None, now)
            .await
            .unwrap();
        assert_ne!(first.record.primary, second.record.primary);
        assert_eq!(actor.registry.len(), 1);
        assert!(actor.registry.find_by_channel(first.record.primary).is_none());
        assert!(platform.channel_exists(second.record.primary).await);
    }

    #[tokio::test]
    async fn test_failed_creation_leaves_no_record() {
        let (mut actor, platform) = actor_with_platform();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        platform.fail_next_creates(1);

        let err = actor
            .handle_create(Member::new(UserId(1), "alice"), vec![], None, now)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::CreationFailed(_)));
        assert!(actor.registry.is_empty());
        assert_eq!(platform.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_voice_pair_is_provisioned_and_indexed() {
        let mut settings = crate::state::settings::test_settings();
        settings.with_voice = true;
        let (mut actor, platform) = super::tests_support::actor_with_settings(settings);
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        let created = actor
            .handle_create(Member::new(UserId(1), "alice"), vec![], None, now)
            .await
            .unwrap();
        let voice = created.record.secondary.unwrap();

        assert_eq!(platform.channel_count(), 2);
        assert_eq!(
            actor.registry.find_by_channel(voice).map(|r| r.owner),
            Some(UserId(1))
        );
    }

    #[tokio::test]
    async fn test_activity_in_unknown_channel_is_ignored() {
        let (mut actor, _platform) = actor_with_platform();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        actor.handle_activity(ChannelRef(404), now);
        assert!(actor.registry.is_empty());
        assert!(!actor.dirty);
    }

    #[tokio::test]
    async fn test_cancel_returns_record_to_active() {
        let (mut actor, _platform) = actor_with_platform();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        actor
            .handle_create(Member::new(UserId(1), "alice"), vec![], None, now)
            .await
            .unwrap();

        assert!(!actor.handle_cancel_delete(UserId(1), None));
        assert_eq!(
            actor.registry.get(UserId(1)).unwrap().state,
            ChannelState::Active
        );
    }
}
