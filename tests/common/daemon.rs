//! Test daemon: a spawned lifecycle actor with a controllable clock.

#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, Utc};
use pvchd::clock::{Clock, ManualClock};
use pvchd::commands::{CommandContext, parse_command};
use pvchd::config::Config;
use pvchd::persistence::{CheckpointStore, NoCheckpoint};
use pvchd::platform::memory::MemoryPlatform;
use pvchd::platform::{ChannelRef, Member, RoleId, UserId};
use pvchd::state::{DeleteConfirmations, LifecycleHandle, LifecycleSettings, Registry};
use std::sync::Arc;

pub const GUILD: u64 = 1;
pub const CATEGORY: u64 = 2;
pub const MODERATOR_ROLE: RoleId = RoleId(3);
pub const ADMIN_ROLE: RoleId = RoleId(4);
pub const SPONSOR_ROLE: RoleId = RoleId(5);
pub const BOT: UserId = UserId(999);

/// Fixed start instant for every test.
pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

pub fn base_config(lifecycle: &str) -> Config {
    let toml = format!(
        "[guild]\nid = {GUILD}\ncategory_id = {CATEGORY}\nmoderator_role_id = {}\n\
         admin_role_id = {}\nsponsor_role_id = {}\nname = \"Test\"\n\n[lifecycle]\n{lifecycle}\n",
        MODERATOR_ROLE.0, ADMIN_ROLE.0, SPONSOR_ROLE.0
    );
    toml::from_str(&toml).expect("test config parses")
}

pub struct TestDaemon {
    pub handle: LifecycleHandle,
    pub platform: Arc<MemoryPlatform>,
    pub clock: Arc<ManualClock>,
    pub confirmations: Arc<DeleteConfirmations>,
    pub commands: CommandContext,
}

impl TestDaemon {
    /// Daemon with default lifecycle settings and no checkpointing.
    pub fn spawn() -> Self {
        Self::with_config(base_config(""))
    }

    pub fn with_lifecycle(lifecycle: &str) -> Self {
        Self::with_config(base_config(lifecycle))
    }

    pub fn with_config(config: Config) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let platform = Arc::new(MemoryPlatform::new(clock.clone()).with_bot(BOT));
        Self::assemble(config, clock, platform, Registry::new(), Arc::new(NoCheckpoint))
    }

    /// Wire an actor around existing parts, e.g. a restored registry.
    pub fn assemble(
        config: Config,
        clock: Arc<ManualClock>,
        platform: Arc<MemoryPlatform>,
        registry: Registry,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let handle = LifecycleHandle::spawn(
            registry,
            platform.clone(),
            store,
            Arc::new(LifecycleSettings::from_config(&config)),
            dyn_clock.clone(),
        );
        let confirmations = Arc::new(DeleteConfirmations::new(
            config.lifecycle.confirm_ttl(),
            dyn_clock,
        ));
        let commands = CommandContext::new(handle.clone(), platform.clone(), confirmations.clone());
        Self {
            handle,
            platform,
            clock,
            confirmations,
            commands,
        }
    }

    /// Register a plain member with the platform and return it.
    pub fn member(&self, id: u64, name: &str) -> Member {
        let member = Member::new(UserId(id), name);
        self.platform.add_member(member.clone());
        member
    }

    pub fn add(&self, member: Member) -> Member {
        self.platform.add_member(member.clone());
        member
    }

    /// Move the clock to `t0() + offset`.
    pub fn at(&self, offset: TimeDelta) -> DateTime<Utc> {
        let now = t0() + offset;
        self.clock.set(now);
        now
    }

    /// Parse and run a console line.
    pub async fn run(&self, line: &str) -> String {
        let command = parse_command(line).expect("non-empty command line");
        self.commands.execute(command).await
    }

    pub async fn primary_of(&self, owner: UserId) -> Option<ChannelRef> {
        self.handle
            .lookup_owner(owner)
            .await
            .expect("actor alive")
            .map(|r| r.primary)
    }

    pub fn granted(&self, channel: ChannelRef, user: UserId) -> bool {
        self.platform
            .channel(channel)
            .is_some_and(|c| c.granted.contains(&user))
    }
}
