//! Discord REST backend.
//!
//! Talks to the Discord HTTP API with a bot token. Only the handful of
//! endpoints the lifecycle core needs are covered.

use super::{
    ChannelKind, ChannelRef, ChannelSpec, Member, OverwriteTarget, PermissionOverwrite,
    PlatformClient, PlatformError, RoleId, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Discord epoch (2015-01-01T00:00:00Z) in milliseconds.
const DISCORD_EPOCH_MS: u64 = 1_420_070_400_000;

const VIEW_CHANNEL: u64 = 1 << 10;
const SEND_MESSAGES: u64 = 1 << 11;
const CONNECT: u64 = 1 << 20;
const SPEAK: u64 = 1 << 21;

const MEMBER_PAGE_SIZE: usize = 1000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Creation time encoded in a snowflake id.
pub fn snowflake_timestamp(id: u64) -> Option<DateTime<Utc>> {
    let millis = (id >> 22).checked_add(DISCORD_EPOCH_MS)?;
    DateTime::from_timestamp_millis(i64::try_from(millis).ok()?)
}

#[derive(Debug, Serialize)]
struct OverwriteBody {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    allow: String,
    deny: String,
}

impl OverwriteBody {
    fn from_overwrite(overwrite: &PermissionOverwrite, channel_kind: ChannelKind) -> Self {
        let (view_bits, send_bits) = match channel_kind {
            ChannelKind::Text => (VIEW_CHANNEL, SEND_MESSAGES),
            ChannelKind::Voice => (VIEW_CHANNEL | CONNECT, SPEAK),
        };
        let mut allow = 0;
        let mut deny = 0;
        if overwrite.can_view {
            allow |= view_bits;
        } else {
            deny |= view_bits;
        }
        if overwrite.can_send {
            allow |= send_bits;
        }
        let (id, kind) = match overwrite.target {
            OverwriteTarget::Role(role) => (role.0, 0),
            OverwriteTarget::Member(user) => (user.0, 1),
        };
        Self {
            id: id.to_string(),
            kind,
            allow: allow.to_string(),
            deny: deny.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateChannelBody<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: u8,
    parent_id: String,
    permission_overwrites: Vec<OverwriteBody>,
}

#[derive(Debug, Serialize)]
struct MessageBody<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChannelBody {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UserBody {
    id: String,
    username: String,
    global_name: Option<String>,
    #[serde(default)]
    bot: bool,
}

#[derive(Debug, Deserialize)]
struct MemberBody {
    user: UserBody,
    nick: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
}

impl MemberBody {
    fn into_member(self) -> Result<Member, PlatformError> {
        let id = self
            .user
            .id
            .parse::<UserId>()
            .map_err(|e| PlatformError::Decode(format!("user id: {e}")))?;
        let roles = self
            .roles
            .iter()
            .filter_map(|r| r.parse::<RoleId>().ok())
            .collect();
        let display_name = self
            .nick
            .or(self.user.global_name)
            .unwrap_or(self.user.username);
        Ok(Member {
            id,
            display_name,
            is_bot: self.user.bot,
            roles,
        })
    }
}

/// [`PlatformClient`] over the Discord REST API.
pub struct DiscordPlatform {
    http: Client,
    api_base: String,
    token: String,
    guild_id: u64,
    bot: Option<UserId>,
}

impl DiscordPlatform {
    pub fn new(api_base: &str, token: &str, guild_id: u64) -> Result<Self, PlatformError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("pvchd/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            guild_id,
            bot: None,
        })
    }

    /// Build the client and resolve the bot's own user id.
    pub async fn connect(api_base: &str, token: &str, guild_id: u64) -> Result<Self, PlatformError> {
        let mut platform = Self::new(api_base, token, guild_id)?;
        let me: UserBody = platform
            .execute(platform.http.get(platform.url("/users/@me")))
            .await?
            .json()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))?;
        let id = me
            .id
            .parse::<UserId>()
            .map_err(|e| PlatformError::Decode(format!("bot id: {e}")))?;
        debug!(bot = %id, name = %me.username, "Resolved bot user");
        platform.bot = Some(id);
        Ok(platform)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, PlatformError> {
        let response = request
            .header(AUTHORIZATION, format!("Bot {}", self.token))
            .send()
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PlatformError::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl PlatformClient for DiscordPlatform {
    fn bot_user(&self) -> Option<UserId> {
        self.bot
    }

    async fn create_channel(&self, spec: &ChannelSpec) -> Result<ChannelRef, PlatformError> {
        let body = CreateChannelBody {
            name: &spec.name,
            kind: match spec.kind {
                ChannelKind::Text => 0,
                ChannelKind::Voice => 2,
            },
            parent_id: spec.parent.to_string(),
            permission_overwrites: spec
                .overwrites
                .iter()
                .map(|o| OverwriteBody::from_overwrite(o, spec.kind))
                .collect(),
        };
        let url = self.url(&format!("/guilds/{}/channels", self.guild_id));
        let created: ChannelBody = self
            .execute(self.http.post(url).json(&body))
            .await?
            .json()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))?;
        created
            .id
            .parse::<ChannelRef>()
            .map_err(|e| PlatformError::Decode(format!("channel id: {e}")))
    }

    async fn delete_channel(&self, channel: ChannelRef) -> Result<(), PlatformError> {
        let url = self.url(&format!("/channels/{channel}"));
        self.execute(self.http.delete(url)).await?;
        Ok(())
    }

    async fn set_permission(
        &self,
        channel: ChannelRef,
        user: UserId,
        allow: bool,
    ) -> Result<(), PlatformError> {
        let url = self.url(&format!("/channels/{channel}/permissions/{user}"));
        if allow {
            let body = OverwriteBody {
                id: user.to_string(),
                kind: 1,
                allow: (VIEW_CHANNEL | SEND_MESSAGES | CONNECT | SPEAK).to_string(),
                deny: "0".to_string(),
            };
            self.execute(self.http.put(url).json(&body)).await?;
        } else {
            self.execute(self.http.delete(url)).await?;
        }
        Ok(())
    }

    async fn send_message(&self, channel: ChannelRef, content: &str) -> Result<(), PlatformError> {
        let url = self.url(&format!("/channels/{channel}/messages"));
        self.execute(self.http.post(url).json(&MessageBody { content }))
            .await?;
        Ok(())
    }

    async fn channel_exists(&self, channel: ChannelRef) -> bool {
        let url = self.url(&format!("/channels/{channel}"));
        match self.execute(self.http.get(url)).await {
            Ok(_) => true,
            Err(PlatformError::NotFound) => false,
            Err(e) => {
                warn!(channel = %channel, error = %e, "Channel existence check inconclusive");
                true
            }
        }
    }

    async fn channel_created_at(&self, channel: ChannelRef) -> Option<DateTime<Utc>> {
        snowflake_timestamp(channel.0)
    }

    async fn list_privileged_members(&self, role: RoleId) -> Result<Vec<UserId>, PlatformError> {
        let mut holders = Vec::new();
        let mut after = 0u64;
        loop {
            let url = self.url(&format!(
                "/guilds/{}/members?limit={}&after={}",
                self.guild_id, MEMBER_PAGE_SIZE, after
            ));
            let page: Vec<MemberBody> = self
                .execute(self.http.get(url))
                .await?
                .json()
                .await
                .map_err(|e| PlatformError::Decode(e.to_string()))?;
            let page_len = page.len();

            for body in page {
                let member = body.into_member()?;
                after = after.max(member.id.0);
                if member.has_role(role) {
                    holders.push(member.id);
                }
            }

            if page_len < MEMBER_PAGE_SIZE {
                break;
            }
        }
        Ok(holders)
    }

    async fn fetch_member(&self, user: UserId) -> Result<Member, PlatformError> {
        let url = self.url(&format!("/guilds/{}/members/{user}", self.guild_id));
        let body: MemberBody = self
            .execute(self.http.get(url))
            .await?
            .json()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))?;
        body.into_member()
    }
}
