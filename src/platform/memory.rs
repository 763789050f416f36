//! In-process platform backend.
//!
//! Keeps channels, members and posted messages in memory. Failure injection
//! hooks let tests exercise the external-failure paths of the lifecycle core.

use super::{
    ChannelRef, ChannelSpec, Member, OverwriteTarget, PlatformClient, PlatformError, RoleId,
    UserId,
};
use crate::clock::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A channel held by [`MemoryPlatform`].
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    pub spec: ChannelSpec,
    pub created_at: DateTime<Utc>,
    /// Members with an explicit allow overwrite.
    pub granted: HashSet<UserId>,
    pub messages: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    channels: HashMap<ChannelRef, MemoryChannel>,
    members: HashMap<UserId, Member>,
    deleted: Vec<ChannelRef>,
    fail_creates: usize,
    fail_delete: HashSet<ChannelRef>,
    fail_permission: HashSet<UserId>,
    auto_members: bool,
}

pub struct MemoryPlatform {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
    bot: Option<UserId>,
}

impl MemoryPlatform {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1000,
                ..Inner::default()
            }),
            clock,
            bot: None,
        }
    }

    pub fn with_bot(mut self, bot: UserId) -> Self {
        self.bot = Some(bot);
        self
    }

    /// Resolve unknown user ids to plain members instead of `NotFound`.
    pub fn with_auto_members(self) -> Self {
        self.inner.lock().auto_members = true;
        self
    }

    pub fn add_member(&self, member: Member) {
        self.inner.lock().members.insert(member.id, member);
    }

    pub fn channel(&self, channel: ChannelRef) -> Option<MemoryChannel> {
        self.inner.lock().channels.get(&channel).cloned()
    }

    pub fn channel_count(&self) -> usize {
        self.inner.lock().channels.len()
    }

    pub fn messages(&self, channel: ChannelRef) -> Vec<String> {
        self.inner
            .lock()
            .channels
            .get(&channel)
            .map(|c| c.messages.clone())
            .unwrap_or_default()
    }

    /// Channels removed through [`PlatformClient::delete_channel`], in order.
    pub fn deleted_channels(&self) -> Vec<ChannelRef> {
        self.inner.lock().deleted.clone()
    }

    /// Make the next `count` channel creations fail.
    pub fn fail_next_creates(&self, count: usize) {
        self.inner.lock().fail_creates = count;
    }

    pub fn set_delete_failure(&self, channel: ChannelRef, failing: bool) {
        let mut inner = self.inner.lock();
        if failing {
            inner.fail_delete.insert(channel);
        } else {
            inner.fail_delete.remove(&channel);
        }
    }

    pub fn fail_permissions_for(&self, user: UserId) {
        self.inner.lock().fail_permission.insert(user);
    }

    /// Remove a channel behind the daemon's back (e.g. deleted by a moderator).
    pub fn vanish(&self, channel: ChannelRef) {
        self.inner.lock().channels.remove(&channel);
    }
}

#[async_trait]
impl PlatformClient for MemoryPlatform {
    fn bot_user(&self) -> Option<UserId> {
        self.bot
    }

    async fn create_channel(&self, spec: &ChannelSpec) -> Result<ChannelRef, PlatformError> {
        let mut inner = self.inner.lock();
        if inner.fail_creates > 0 {
            inner.fail_creates -= 1;
            return Err(PlatformError::Rejected("injected create failure".into()));
        }

        inner.next_id += 1;
        let channel = ChannelRef(inner.next_id);
        let granted = spec
            .overwrites
            .iter()
            .filter(|o| o.can_view)
            .filter_map(|o| match o.target {
                OverwriteTarget::Member(user) => Some(user),
                OverwriteTarget::Role(_) => None,
            })
            .collect();
        inner.channels.insert(
            channel,
            MemoryChannel {
                spec: spec.clone(),
                created_at: self.clock.now(),
                granted,
                messages: Vec::new(),
            },
        );
        Ok(channel)
    }

    async fn delete_channel(&self, channel: ChannelRef) -> Result<(), PlatformError> {
        let mut inner = self.inner.lock();
        if inner.fail_delete.contains(&channel) {
            return Err(PlatformError::Http {
                status: 500,
                body: "injected delete failure".into(),
            });
        }
        match inner.channels.remove(&channel) {
            Some(_) => {
                inner.deleted.push(channel);
                Ok(())
            }
            None => Err(PlatformError::NotFound),
        }
    }

    async fn set_permission(
        &self,
        channel: ChannelRef,
        user: UserId,
        allow: bool,
    ) -> Result<(), PlatformError> {
        let mut inner = self.inner.lock();
        if inner.fail_permission.contains(&user) {
            return Err(PlatformError::Http {
                status: 403,
                body: "injected permission failure".into(),
            });
        }
        let entry = inner
            .channels
            .get_mut(&channel)
            .ok_or(PlatformError::NotFound)?;
        if allow {
            entry.granted.insert(user);
        } else {
            entry.granted.remove(&user);
        }
        Ok(())
    }

    async fn send_message(&self, channel: ChannelRef, content: &str) -> Result<(), PlatformError> {
        let mut inner = self.inner.lock();
        let entry = inner
            .channels
            .get_mut(&channel)
            .ok_or(PlatformError::NotFound)?;
        entry.messages.push(content.to_string());
        Ok(())
    }

    async fn channel_exists(&self, channel: ChannelRef) -> bool {
        self.inner.lock().channels.contains_key(&channel)
    }

    async fn channel_created_at(&self, channel: ChannelRef) -> Option<DateTime<Utc>> {
        self.inner.lock().channels.get(&channel).map(|c| c.created_at)
    }

    async fn list_privileged_members(&self, role: RoleId) -> Result<Vec<UserId>, PlatformError> {
        Ok(self
            .inner
            .lock()
            .members
            .values()
            .filter(|m| m.has_role(role))
            .map(|m| m.id)
            .collect())
    }

    async fn fetch_member(&self, user: UserId) -> Result<Member, PlatformError> {
        let inner = self.inner.lock();
        match inner.members.get(&user) {
            Some(member) => Ok(member.clone()),
            None if inner.auto_members => Ok(Member::new(user, format!("user-{user}"))),
            None => Err(PlatformError::NotFound),
        }
    }
}
