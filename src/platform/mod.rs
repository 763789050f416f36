//! Chat-platform client abstraction.
//!
//! The lifecycle core never talks to the chat platform directly; it goes
//! through [`PlatformClient`]. Two implementations ship with the daemon:
//! - [`memory::MemoryPlatform`]: in-process, used by tests and dry runs
//! - [`discord::DiscordPlatform`]: the Discord REST API

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use thiserror::Error;

pub mod discord;
pub mod memory;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u64>().map(Self)
            }
        }
    };
}

snowflake_id!(
    /// Opaque identity of a platform user.
    UserId
);
snowflake_id!(
    /// Opaque handle to a platform channel (text or voice).
    ChannelRef
);
snowflake_id!(
    /// Opaque identity of a platform role.
    RoleId
);

/// A guild member as seen by the command layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: UserId,
    pub display_name: String,
    pub is_bot: bool,
    pub roles: Vec<RoleId>,
}

impl Member {
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            is_bot: false,
            roles: Vec::new(),
        }
    }

    pub fn bot(mut self) -> Self {
        self.is_bot = true;
        self
    }

    pub fn with_role(mut self, role: RoleId) -> Self {
        self.roles.push(role);
        self
    }

    pub fn has_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Text,
    Voice,
}

/// Who a permission overwrite applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteTarget {
    Role(RoleId),
    Member(UserId),
}

/// Explicit per-identity permission overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionOverwrite {
    pub target: OverwriteTarget,
    pub can_view: bool,
    pub can_send: bool,
}

impl PermissionOverwrite {
    pub fn allow(target: OverwriteTarget) -> Self {
        Self {
            target,
            can_view: true,
            can_send: true,
        }
    }

    pub fn deny(target: OverwriteTarget) -> Self {
        Self {
            target,
            can_view: false,
            can_send: false,
        }
    }
}

/// Everything needed to create one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: String,
    pub kind: ChannelKind,
    /// Category the channel is created under.
    pub parent: ChannelRef,
    pub overwrites: Vec<PermissionOverwrite>,
}

/// Platform API failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("resource not found")]
    NotFound,

    #[error("platform returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed platform response: {0}")]
    Decode(String),

    #[error("request rejected: {0}")]
    Rejected(String),
}

impl PlatformError {
    /// Static label for metrics.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Http { .. } => "http",
            Self::Transport(_) => "transport",
            Self::Decode(_) => "decode",
            Self::Rejected(_) => "rejected",
        }
    }
}

/// Operations consumed from the chat platform.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// The bot's own user id, when known. Private channels grant it access.
    fn bot_user(&self) -> Option<UserId>;

    async fn create_channel(&self, spec: &ChannelSpec) -> Result<ChannelRef, PlatformError>;

    async fn delete_channel(&self, channel: ChannelRef) -> Result<(), PlatformError>;

    /// Grant (`allow = true`) or remove a member's access to `channel`.
    async fn set_permission(
        &self,
        channel: ChannelRef,
        user: UserId,
        allow: bool,
    ) -> Result<(), PlatformError>;

    async fn send_message(&self, channel: ChannelRef, content: &str) -> Result<(), PlatformError>;

    /// Whether `channel` still exists.
    ///
    /// Implementations answer `true` when they cannot tell, so an
    /// inconclusive check never purges a live record.
    async fn channel_exists(&self, channel: ChannelRef) -> bool;

    /// Creation timestamp of `channel`, if the platform can report it.
    async fn channel_created_at(&self, channel: ChannelRef) -> Option<DateTime<Utc>>;

    /// All members holding `role`.
    async fn list_privileged_members(&self, role: RoleId) -> Result<Vec<UserId>, PlatformError>;

    async fn fetch_member(&self, user: UserId) -> Result<Member, PlatformError>;
}
