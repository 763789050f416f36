//! Core configuration types and loading.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::defaults::*;
use crate::policy::{ExpiryPolicy, InactivityAllowance, LifecyclePolicy};
use chrono::TimeDelta;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Where private channels live.
    pub guild: GuildConfig,
    /// Deadlines, notices and channel provisioning.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Guild (community) scope.
#[derive(Debug, Clone, Deserialize)]
pub struct GuildConfig {
    /// Guild id. The @everyone role shares it.
    pub id: u64,
    /// Category under which private channels are created.
    pub category_id: u64,
    /// Exempt from invite/kick; can view every private channel.
    pub moderator_role_id: u64,
    /// Holders may delete other owners' channels.
    pub admin_role_id: Option<u64>,
    /// Holders get the longer inactivity allowance.
    pub sponsor_role_id: Option<u64>,
    /// Shown in the welcome message.
    #[serde(default = "default_guild_name")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default)]
    pub policy: ExpiryPolicy,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_extension_window_secs")]
    pub extension_window_secs: u64,
    #[serde(default = "default_notice_lead_secs")]
    pub notice_lead_secs: u64,
    #[serde(default = "default_inactive_days")]
    pub inactive_days: u32,
    #[serde(default = "default_sponsor_inactive_days")]
    pub sponsor_inactive_days: u32,
    /// Delay between an in-channel delete confirmation and the deletion.
    #[serde(default = "default_delete_grace_secs")]
    pub delete_grace_secs: u64,
    /// Pair every text channel with a voice channel.
    #[serde(default)]
    pub with_voice: bool,
    /// Count voice-channel activity toward the inactivity deadline.
    #[serde(default)]
    pub count_voice_activity: bool,
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,
    /// Lifetime of an unconfirmed delete ticket.
    #[serde(default = "default_confirm_ttl_secs")]
    pub confirm_ttl_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            policy: ExpiryPolicy::default(),
            ttl_secs: default_ttl_secs(),
            extension_window_secs: default_extension_window_secs(),
            notice_lead_secs: default_notice_lead_secs(),
            inactive_days: default_inactive_days(),
            sponsor_inactive_days: default_sponsor_inactive_days(),
            delete_grace_secs: default_delete_grace_secs(),
            with_voice: false,
            count_voice_activity: false,
            channel_prefix: default_channel_prefix(),
            confirm_ttl_secs: default_confirm_ttl_secs(),
        }
    }
}

impl LifecycleConfig {
    /// Policy parameters. Assumes the config has passed validation, which
    /// bounds every duration.
    pub fn policy(&self) -> LifecyclePolicy {
        LifecyclePolicy {
            kind: self.policy,
            ttl: secs(self.ttl_secs),
            extension_window: secs(self.extension_window_secs),
            notice_lead: secs(self.notice_lead_secs),
            inactivity: InactivityAllowance {
                standard_days: self.inactive_days,
                sponsor_days: self.sponsor_inactive_days,
            },
        }
    }

    pub fn confirm_ttl(&self) -> TimeDelta {
        secs(self.confirm_ttl_secs)
    }
}

fn secs(value: u64) -> TimeDelta {
    TimeDelta::seconds(i64::try_from(value).unwrap_or(i64::MAX / 1_000))
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    #[default]
    File,
    Sqlite,
    None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub backend: PersistenceBackend,
    #[serde(default = "default_persistence_path")]
    pub path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::default(),
            path: default_persistence_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformBackend {
    /// In-process platform; useful for trying the daemon out.
    #[default]
    Memory,
    Discord,
}

#[derive(Clone, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub backend: PlatformBackend,
    /// Bot token. Required for the discord backend.
    pub token: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("backend", &self.backend)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            backend: PlatformBackend::default(),
            token: None,
            api_base: default_api_base(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    /// Prometheus metrics HTTP port. 0 disables the endpoint.
    #[serde(default)]
    pub metrics_port: u16,
    #[serde(default)]
    pub log_format: LogFormat,
}
