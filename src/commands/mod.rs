//! Console command layer.
//!
//! Turns parsed [`Command`]s into calls on the lifecycle handle and renders
//! a text reply for the issuing user. Errors are rendered through
//! [`LifecycleError::user_message`]; nothing here panics on bad input.

mod parse;

pub use parse::{Command, parse_command, usage};

use crate::error::{LifecycleError, LifecycleResult};
use crate::messages;
use crate::platform::{Member, PlatformClient, UserId};
use crate::state::{
    Cancelled, ChannelRecord, DeleteConfirmations, DeletionOutcome, LifecycleHandle, SweepReport,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a command needs to run.
#[derive(Clone)]
pub struct CommandContext {
    handle: LifecycleHandle,
    platform: Arc<dyn PlatformClient>,
    confirmations: Arc<DeleteConfirmations>,
}

impl CommandContext {
    pub fn new(
        handle: LifecycleHandle,
        platform: Arc<dyn PlatformClient>,
        confirmations: Arc<DeleteConfirmations>,
    ) -> Self {
        Self {
            handle,
            platform,
            confirmations,
        }
    }

    /// Run one command and return the reply text.
    pub async fn execute(&self, command: Command) -> String {
        debug!(?command, "Executing command");
        match self.dispatch(command).await {
            Ok(reply) => reply,
            Err(e) => {
                if matches!(e, LifecycleError::External(_) | LifecycleError::CreationFailed(_)) {
                    warn!(error = %e, code = e.error_code(), "Command failed");
                } else {
                    debug!(code = e.error_code(), "Command rejected");
                }
                e.user_message()
            }
        }
    }

    async fn dispatch(&self, command: Command) -> LifecycleResult<String> {
        match command {
            Command::Create {
                owner,
                invitees,
                origin,
            } => {
                let owner = self.member(owner).await?;
                let (invitees, unknown) = self.members(&invitees).await;
                let outcome = self.handle.handle_create(owner, invitees, origin).await?;
                let mut reply = format!(
                    "Created private channel <#{}>. Expires: {}",
                    outcome.record.primary,
                    messages::format_deadline(outcome.record.expires_at)
                );
                if !outcome.invites.is_empty() {
                    reply.push('\n');
                    reply.push_str(&messages::invite_result(&outcome.invites));
                }
                Ok(with_unknown(reply, &unknown))
            }
            Command::Delete {
                requester,
                target,
                origin,
            } => {
                let requester = self.member(requester).await?;
                let by = requester.id;
                let ticket = self.confirmations.request(requester, target, origin);
                let whose = match target {
                    Some(owner) if owner != by => format!("the private channel of {owner}"),
                    _ => "your private channel".to_string(),
                };
                Ok(format!(
                    "Do you really want to delete {whose}?\n\
                     Reply `confirm {by} {ticket}` to proceed or `cancel {by} {ticket}` to abort."
                ))
            }
            Command::Confirm { user, ticket } => {
                match self.confirmations.confirm(ticket, user, &self.handle).await? {
                    DeletionOutcome::Scheduled { channel, grace, .. } if !grace.is_zero() => Ok(
                        format!("<#{channel}> will be deleted in about {} seconds.", grace.as_secs()),
                    ),
                    DeletionOutcome::Scheduled { channel, .. } => {
                        Ok(format!("<#{channel}> is being deleted."))
                    }
                    DeletionOutcome::Deleted { owner, channel } => {
                        Ok(format!("Deleted <#{channel}> owned by {owner}."))
                    }
                }
            }
            Command::Cancel { user, ticket } => {
                match self.confirmations.cancel(ticket, user, &self.handle).await? {
                    Cancelled::Request => Ok("Deletion cancelled.".to_string()),
                    Cancelled::Deletion => Ok("Deletion stopped; the channel is kept.".to_string()),
                    Cancelled::TooLate => Ok("Too late: the channel has already been deleted.".to_string()),
                }
            }
            Command::Invite {
                owner,
                targets,
                origin,
            } => {
                let (targets, unknown) = self.members(&targets).await;
                let outcome = self.handle.handle_invite(owner, targets, origin).await?;
                Ok(with_unknown(messages::invite_result(&outcome), &unknown))
            }
            Command::Kick {
                owner,
                targets,
                origin,
            } => {
                let (targets, unknown) = self.members(&targets).await;
                let outcome = self.handle.handle_kick(owner, targets, origin).await?;
                Ok(with_unknown(messages::kick_result(&outcome), &unknown))
            }
            Command::Leave { user, channel } => {
                let member = self.member(user).await?;
                let owner = self.handle.handle_leave(member, channel).await?;
                Ok(format!("You have left the private channel of {owner}."))
            }
            Command::Extend { owner } => {
                let outcome = self.handle.handle_extend(owner, self.handle.now()).await?;
                Ok(messages::extended(outcome.expires_at))
            }
            Command::Activity { channel } => {
                self.handle.record_activity(channel, self.handle.now()).await?;
                Ok(format!("Activity recorded for <#{channel}>."))
            }
            Command::List => {
                let mut records = self.handle.snapshot().await?;
                records.sort_by_key(|r| r.expires_at);
                Ok(render_list(&records))
            }
            Command::Sweep => {
                let report = self.handle.sweep(self.handle.now()).await?;
                Ok(render_sweep(&report))
            }
            Command::Help => Ok(usage()),
            Command::Invalid { message } => Ok(message),
        }
    }

    async fn member(&self, user: UserId) -> LifecycleResult<Member> {
        self.platform
            .fetch_member(user)
            .await
            .map_err(LifecycleError::External)
    }

    /// Resolve `users`, splitting off ids the platform does not know.
    async fn members(&self, users: &[UserId]) -> (Vec<Member>, Vec<UserId>) {
        let mut found = Vec::with_capacity(users.len());
        let mut unknown = Vec::new();
        for &user in users {
            match self.platform.fetch_member(user).await {
                Ok(member) => found.push(member),
                Err(e) => {
                    debug!(%user, error = %e, "Member lookup failed");
                    unknown.push(user);
                }
            }
        }
        (found, unknown)
    }
}

fn with_unknown(mut reply: String, unknown: &[UserId]) -> String {
    if !unknown.is_empty() {
        let ids: Vec<String> = unknown.iter().map(ToString::to_string).collect();
        reply.push_str(&format!("\nUnknown users: {}", ids.join(", ")));
    }
    reply
}

fn render_list(records: &[ChannelRecord]) -> String {
    if records.is_empty() {
        return "No private channels.".to_string();
    }
    let mut out = format!("{} private channel(s):", records.len());
    for record in records {
        let voice = record
            .secondary
            .map(|c| format!(" + voice <#{c}>"))
            .unwrap_or_default();
        let pending = if record.is_pending_delete() {
            " (deleting)"
        } else {
            ""
        };
        out.push_str(&format!(
            "\n- {} <#{}>{voice} expires {}{pending}",
            record.owner,
            record.primary,
            messages::format_deadline(record.expires_at)
        ));
    }
    out
}

fn render_sweep(report: &SweepReport) -> String {
    format!(
        "Sweep: {} evaluated, {} notice(s), {} deleted, {} failed",
        report.evaluated,
        report.notices.len(),
        report.deleted.len(),
        report.failed.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::config::Config;
    use crate::persistence::NoCheckpoint;
    use crate::platform::memory::MemoryPlatform;
    use crate::state::{LifecycleSettings, Registry};
    use chrono::{DateTime, TimeDelta};

    fn context() -> (CommandContext, Arc<MemoryPlatform>) {
        let config: Config = toml::from_str(
            "[guild]\nid = 1\ncategory_id = 2\nmoderator_role_id = 3\n",
        )
        .unwrap();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let platform = Arc::new(MemoryPlatform::new(clock.clone()));
        platform.add_member(Member::new(UserId(10), "alice"));
        platform.add_member(Member::new(UserId(11), "bob"));
        let handle = LifecycleHandle::spawn(
            Registry::new(),
            platform.clone(),
            Arc::new(NoCheckpoint),
            Arc::new(LifecycleSettings::from_config(&config)),
            clock.clone(),
        );
        let confirmations = Arc::new(DeleteConfirmations::new(TimeDelta::seconds(60), clock));
        (
            CommandContext::new(handle, platform.clone(), confirmations),
            platform,
        )
    }

    #[tokio::test]
    async fn create_reports_unknown_invitees() {
        let (ctx, platform) = context();
        let reply = ctx
            .execute(parse_command("create 10 11 99").unwrap())
            .await;

        assert!(reply.starts_with("Created private channel"), "{reply}");
        assert!(reply.contains("bob"));
        assert!(reply.contains("Unknown users: 99"));
        assert_eq!(platform.channel_count(), 1);
    }

    #[tokio::test]
    async fn errors_render_user_messages() {
        let (ctx, _platform) = context();
        let reply = ctx.execute(Command::Extend { owner: UserId(10) }).await;
        assert_eq!(reply, LifecycleError::NotFound.user_message());

        let reply = ctx.execute(parse_command("create 77").unwrap()).await;
        assert_eq!(
            reply,
            LifecycleError::External(crate::platform::PlatformError::NotFound).user_message()
        );
    }

    #[tokio::test]
    async fn delete_issues_ticket_prompt() {
        let (ctx, _platform) = context();
        ctx.execute(parse_command("create 10").unwrap()).await;
        let reply = ctx.execute(parse_command("delete 10").unwrap()).await;

        assert!(reply.contains("your private channel"));
        assert!(reply.contains("confirm 10 "));
        assert_eq!(ctx.confirmations.len(), 1);
    }

    #[tokio::test]
    async fn list_is_empty_initially() {
        let (ctx, _platform) = context();
        assert_eq!(ctx.execute(Command::List).await, "No private channels.");
    }
}
