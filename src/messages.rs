//! Text posted into private channels.

use crate::state::BatchOutcome;
use chrono::{DateTime, Utc};
use std::time::Duration;

pub fn format_deadline(at: DateTime<Utc>) -> String {
    at.format("%Y/%m/%d %H:%M:%S UTC").to_string()
}

/// Welcome message posted when a channel is created.
pub fn welcome(guild_name: &str, expires_at: DateTime<Utc>) -> String {
    format!(
        "**Welcome! This is your private channel.**\n\
         Only you and the people you invite can see it (moderators excepted).\n\
         It is deleted automatically when it expires; use `delete` to remove it sooner.\n\n\
         Note: the {guild_name} server guidelines still apply here.\n\
         Expires: {}",
        format_deadline(expires_at)
    )
}

/// The revised status message posted after an extension.
pub fn extended(expires_at: DateTime<Utc>) -> String {
    format!(
        "This private channel has been extended.\nExpires: {}",
        format_deadline(expires_at)
    )
}

pub fn expiry_notice(expires_at: DateTime<Utc>) -> String {
    format!(
        "This private channel will be deleted at {}. Use `extend` to keep it a little longer.",
        format_deadline(expires_at)
    )
}

pub fn deleting_soon(grace: Duration) -> String {
    format!(
        "This private channel will be deleted in about {} seconds.",
        grace.as_secs()
    )
}

fn batch_section(out: &mut String, label: &str, names: &[String]) {
    if names.is_empty() {
        return;
    }
    out.push_str(&format!("\n{label}: {}", names.join(", ")));
}

fn render_batch(title: &str, outcome: &BatchOutcome) -> String {
    let names = |members: &[crate::platform::Member]| -> Vec<String> {
        members.iter().map(|m| m.display_name.clone()).collect()
    };
    let mut out = title.to_string();
    batch_section(&mut out, "Success", &names(&outcome.success));
    batch_section(&mut out, "Failed", &names(&outcome.failed));
    batch_section(&mut out, "Ignored", &names(&outcome.ignored));
    out
}

pub fn invite_result(outcome: &BatchOutcome) -> String {
    render_batch("**Private channel invitation**", outcome)
}

pub fn kick_result(outcome: &BatchOutcome) -> String {
    render_batch("**Private channel removal**", outcome)
}

pub fn member_left(display_name: &str) -> String {
    format!("{display_name} has left this private channel.")
}
