//! Runtime settings consumed by the lifecycle actor.

use crate::config::Config;
use crate::platform::{
    ChannelKind, ChannelRef, ChannelSpec, Member, OverwriteTarget, PermissionOverwrite, RoleId,
    UserId,
};
use crate::policy::LifecyclePolicy;
use std::time::Duration;

/// Where private channels live and which roles are special.
#[derive(Debug, Clone)]
pub struct GuildScope {
    pub guild_id: u64,
    pub category: ChannelRef,
    /// Exempt from invite/kick and able to see every private channel.
    pub moderator_role: RoleId,
    /// Holders may delete other owners' channels.
    pub admin_role: Option<RoleId>,
    /// Holders get the longer inactivity allowance.
    pub sponsor_role: Option<RoleId>,
    pub name: String,
}

impl GuildScope {
    /// The @everyone role shares the guild's id.
    pub fn everyone_role(&self) -> RoleId {
        RoleId(self.guild_id)
    }

    pub fn is_moderator(&self, member: &Member) -> bool {
        member.has_role(self.moderator_role)
    }

    pub fn is_admin(&self, member: &Member) -> bool {
        self.admin_role.is_some_and(|role| member.has_role(role))
    }
}

#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub guild: GuildScope,
    pub policy: LifecyclePolicy,
    pub delete_grace: Duration,
    pub with_voice: bool,
    pub channel_prefix: String,
    /// Whether activity in the paired voice channel counts toward the
    /// inactivity deadline.
    pub count_voice_activity: bool,
}

impl LifecycleSettings {
    pub fn from_config(config: &Config) -> Self {
        let guild = &config.guild;
        let lifecycle = &config.lifecycle;
        Self {
            guild: GuildScope {
                guild_id: guild.id,
                category: ChannelRef(guild.category_id),
                moderator_role: RoleId(guild.moderator_role_id),
                admin_role: guild.admin_role_id.map(RoleId),
                sponsor_role: guild.sponsor_role_id.map(RoleId),
                name: guild.name.clone(),
            },
            policy: lifecycle.policy(),
            delete_grace: Duration::from_secs(lifecycle.delete_grace_secs),
            with_voice: lifecycle.with_voice,
            channel_prefix: lifecycle.channel_prefix.clone(),
            count_voice_activity: lifecycle.count_voice_activity,
        }
    }

    /// Channel name for `owner`, e.g. `pvch-alice`.
    pub fn channel_name(&self, owner: &Member) -> String {
        let slug: String = owner
            .display_name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect();
        let slug = slug.trim_matches('-');
        if slug.is_empty() {
            format!("{}-{}", self.channel_prefix, owner.id)
        } else {
            format!("{}-{}", self.channel_prefix, slug)
        }
    }

    /// Overwrites applied at creation: hidden from everyone, visible to
    /// moderators, the bot and the owner.
    pub fn initial_overwrites(&self, owner: UserId, bot: Option<UserId>) -> Vec<PermissionOverwrite> {
        let mut overwrites = vec![
            PermissionOverwrite::deny(OverwriteTarget::Role(self.guild.everyone_role())),
            PermissionOverwrite::allow(OverwriteTarget::Role(self.guild.moderator_role)),
        ];
        if let Some(bot) = bot {
            overwrites.push(PermissionOverwrite::allow(OverwriteTarget::Member(bot)));
        }
        overwrites.push(PermissionOverwrite::allow(OverwriteTarget::Member(owner)));
        overwrites
    }

    pub fn channel_spec(&self, owner: &Member, kind: ChannelKind, bot: Option<UserId>) -> ChannelSpec {
        ChannelSpec {
            name: self.channel_name(owner),
            kind,
            parent: self.guild.category,
            overwrites: self.initial_overwrites(owner.id, bot),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_settings() -> LifecycleSettings {
    LifecycleSettings {
        guild: GuildScope {
            guild_id: 1,
            category: ChannelRef(2),
            moderator_role: RoleId(3),
            admin_role: Some(RoleId(4)),
            sponsor_role: Some(RoleId(5)),
            name: "Example".into(),
        },
        policy: LifecyclePolicy::default(),
        delete_grace: Duration::from_secs(5),
        with_voice: false,
        channel_prefix: "pvch".into(),
        count_voice_activity: false,
    }
}
