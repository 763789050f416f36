//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use std::path::PathBuf;

pub fn default_guild_name() -> String {
    "this server".to_string()
}

// =============================================================================
// Lifecycle Defaults
// =============================================================================

/// 24 hours.
pub fn default_ttl_secs() -> u64 {
    86_400
}

/// 6 hours.
pub fn default_extension_window_secs() -> u64 {
    21_600
}

/// 15 minutes.
pub fn default_notice_lead_secs() -> u64 {
    900
}

pub fn default_inactive_days() -> u32 {
    7
}

pub fn default_sponsor_inactive_days() -> u32 {
    14
}

pub fn default_delete_grace_secs() -> u64 {
    5
}

pub fn default_channel_prefix() -> String {
    "pvch".to_string()
}

pub fn default_confirm_ttl_secs() -> u64 {
    60
}

// =============================================================================
// Scheduler / Persistence / Platform Defaults
// =============================================================================

pub fn default_sweep_interval_secs() -> u64 {
    60
}

pub fn default_persistence_path() -> PathBuf {
    PathBuf::from("pvch_data.csv")
}

pub fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}
