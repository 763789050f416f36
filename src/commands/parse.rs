//! Console command parsing.

use crate::platform::{ChannelRef, UserId};
use std::str::FromStr;
use uuid::Uuid;

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create {
        owner: UserId,
        invitees: Vec<UserId>,
        origin: Option<ChannelRef>,
    },
    Delete {
        requester: UserId,
        target: Option<UserId>,
        origin: Option<ChannelRef>,
    },
    Confirm {
        user: UserId,
        ticket: Uuid,
    },
    Cancel {
        user: UserId,
        ticket: Uuid,
    },
    Invite {
        owner: UserId,
        targets: Vec<UserId>,
        origin: Option<ChannelRef>,
    },
    Kick {
        owner: UserId,
        targets: Vec<UserId>,
        origin: Option<ChannelRef>,
    },
    Leave {
        user: UserId,
        channel: ChannelRef,
    },
    Extend {
        owner: UserId,
    },
    Activity {
        channel: ChannelRef,
    },
    List,
    Sweep,
    Help,
    Invalid {
        message: String,
    },
}

pub fn usage() -> String {
    [
        "Supported commands:",
        "- `create <owner> [invitee...] [--in <channel>]`",
        "- `delete <requester> [target_owner] [--in <channel>]`",
        "- `confirm <user> <ticket>` / `cancel <user> <ticket>`",
        "- `invite <owner> <user...> [--in <channel>]`",
        "- `kick <owner> <user...> --in <channel>`",
        "- `leave <user> <channel>`",
        "- `extend <owner>`",
        "- `activity <channel>`",
        "- `list`",
        "- `sweep`",
    ]
    .join("\n")
}

fn invalid(message: impl Into<String>) -> Command {
    Command::Invalid {
        message: message.into(),
    }
}

/// Parse one input line. Returns `None` for blank lines and `#` comments.
pub fn parse_command(line: &str) -> Option<Command> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let mut tokens: Vec<&str> = trimmed.split_whitespace().collect();
    let command = tokens.remove(0);

    let origin = match take_origin(&mut tokens) {
        Ok(origin) => origin,
        Err(message) => return Some(invalid(message)),
    };

    let parsed = match (command, tokens.as_slice()) {
        ("create", [owner, invitees @ ..]) => {
            match (parse_id::<UserId>(owner), parse_ids(invitees)) {
                (Some(owner), Some(invitees)) => Command::Create {
                    owner,
                    invitees,
                    origin,
                },
                _ => invalid("Usage: create <owner> [invitee...] [--in <channel>]"),
            }
        }
        ("delete", [requester]) => match parse_id(requester) {
            Some(requester) => Command::Delete {
                requester,
                target: None,
                origin,
            },
            None => invalid("Usage: delete <requester> [target_owner] [--in <channel>]"),
        },
        ("delete", [requester, target]) => match (parse_id(requester), parse_id(target)) {
            (Some(requester), Some(target)) => Command::Delete {
                requester,
                target: Some(target),
                origin,
            },
            _ => invalid("Usage: delete <requester> [target_owner] [--in <channel>]"),
        },
        ("confirm" | "cancel", [user, ticket]) if origin.is_none() => {
            match (parse_id(user), Uuid::parse_str(ticket).ok()) {
                (Some(user), Some(ticket)) if command == "confirm" => Command::Confirm { user, ticket },
                (Some(user), Some(ticket)) => Command::Cancel { user, ticket },
                _ => invalid(format!("Usage: {command} <user> <ticket>")),
            }
        }
        ("invite" | "kick", [owner, targets @ ..]) if !targets.is_empty() => {
            match (parse_id::<UserId>(owner), parse_ids(targets)) {
                (Some(owner), Some(targets)) if command == "invite" => Command::Invite {
                    owner,
                    targets,
                    origin,
                },
                (Some(owner), Some(targets)) => Command::Kick {
                    owner,
                    targets,
                    origin,
                },
                _ => invalid(format!("Usage: {command} <owner> <user...> [--in <channel>]")),
            }
        }
        ("leave", [user, channel]) if origin.is_none() => match (parse_id(user), parse_id(channel)) {
            (Some(user), Some(channel)) => Command::Leave { user, channel },
            _ => invalid("Usage: leave <user> <channel>"),
        },
        ("extend", [owner]) if origin.is_none() => match parse_id(owner) {
            Some(owner) => Command::Extend { owner },
            None => invalid("Usage: extend <owner>"),
        },
        ("activity", [channel]) if origin.is_none() => match parse_id(channel) {
            Some(channel) => Command::Activity { channel },
            None => invalid("Usage: activity <channel>"),
        },
        ("list", []) if origin.is_none() => Command::List,
        ("sweep", []) if origin.is_none() => Command::Sweep,
        ("help", _) => Command::Help,
        _ => invalid(usage()),
    };
    Some(parsed)
}

/// Remove a `--in <channel>` pair from `tokens`.
fn take_origin(tokens: &mut Vec<&str>) -> Result<Option<ChannelRef>, String> {
    let Some(pos) = tokens.iter().position(|t| *t == "--in") else {
        return Ok(None);
    };
    if pos + 1 >= tokens.len() {
        return Err("`--in` needs a channel id".to_string());
    }
    let channel = parse_id(tokens[pos + 1])
        .ok_or_else(|| format!("invalid channel id: {}", tokens[pos + 1]))?;
    tokens.drain(pos..pos + 2);
    Ok(Some(channel))
}

fn parse_id<T: FromStr>(token: &str) -> Option<T> {
    token.parse().ok()
}

fn parse_ids<T: FromStr>(tokens: &[&str]) -> Option<Vec<T>> {
    tokens.iter().map(|t| parse_id(t)).collect()
}
