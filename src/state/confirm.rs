//! Delete confirmation sub-flow.
//!
//! A delete request first issues a ticket. Only the requester can confirm
//! or cancel it, and only until it expires. A confirmed ticket stays armed
//! for the grace delay so that cancelling it can still stop the deletion.

use super::actor::DeletionOutcome;
use super::LifecycleHandle;
use crate::clock::Clock;
use crate::error::{LifecycleError, LifecycleResult};
use crate::platform::{ChannelRef, Member, UserId};
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Ticket {
    requester: Member,
    target: Option<UserId>,
    origin: Option<ChannelRef>,
    issued_at: DateTime<Utc>,
}

/// Confirmed ticket whose deletion may still be inside its grace delay.
#[derive(Debug, Clone, Copy)]
struct Armed {
    requester: UserId,
    owner: UserId,
    token: u64,
    until: DateTime<Utc>,
}

/// Outcome of cancelling a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancelled {
    /// The ticket was never confirmed.
    Request,
    /// The deletion was stopped during its grace delay.
    Deletion,
    /// The deletion had already run.
    TooLate,
}

pub struct DeleteConfirmations {
    pending: DashMap<Uuid, Ticket>,
    armed: DashMap<Uuid, Armed>,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl DeleteConfirmations {
    pub fn new(ttl: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            pending: DashMap::new(),
            armed: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// Open a ticket for deleting `target` (or the requester's own channel).
    pub fn request(&self, requester: Member, target: Option<UserId>, origin: Option<ChannelRef>) -> Uuid {
        self.purge_expired();
        let id = Uuid::new_v4();
        debug!(ticket = %id, requester = %requester.id, "Delete confirmation requested");
        self.pending.insert(
            id,
            Ticket {
                requester,
                target,
                origin,
                issued_at: self.clock.now(),
            },
        );
        id
    }

    /// Confirm a ticket and run the deletion.
    pub async fn confirm(
        &self,
        id: Uuid,
        by: UserId,
        handle: &LifecycleHandle,
    ) -> LifecycleResult<DeletionOutcome> {
        let ticket = self.take(id, by)?;
        let outcome = handle
            .handle_delete(ticket.requester, ticket.target, ticket.origin)
            .await?;

        if let DeletionOutcome::Scheduled {
            owner, grace, token, ..
        } = outcome
        {
            let grace = TimeDelta::from_std(grace).unwrap_or(TimeDelta::zero());
            self.armed.insert(
                id,
                Armed {
                    requester: by,
                    owner,
                    token,
                    until: self.clock.now() + grace + self.ttl,
                },
            );
        }
        Ok(outcome)
    }

    /// Cancel a ticket, stopping a scheduled deletion if it has not run yet.
    pub async fn cancel(&self, id: Uuid, by: UserId, handle: &LifecycleHandle) -> LifecycleResult<Cancelled> {
        if self.armed.get(&id).is_some_and(|a| a.requester != by) {
            return Err(LifecycleError::Unauthorized);
        }
        if let Some((_, armed)) = self.armed.remove(&id) {
            return if handle.cancel_scheduled(armed.owner, armed.token).await? {
                Ok(Cancelled::Deletion)
            } else {
                Ok(Cancelled::TooLate)
            };
        }
        self.take(id, by)?;
        Ok(Cancelled::Request)
    }

    /// Remove an unconfirmed ticket after checking who holds it.
    fn take(&self, id: Uuid, by: UserId) -> LifecycleResult<Ticket> {
        let now = self.clock.now();
        let (_, ticket) = self
            .pending
            .remove_if(&id, |_, t| t.requester.id == by)
            .ok_or_else(|| {
                if self.pending.contains_key(&id) {
                    LifecycleError::Unauthorized
                } else {
                    LifecycleError::ConfirmationExpired
                }
            })?;
        if now - ticket.issued_at > self.ttl {
            return Err(LifecycleError::ConfirmationExpired);
        }
        Ok(ticket)
    }

    /// Drop tickets that can no longer be confirmed or cancelled.
    pub fn purge_expired(&self) {
        let now = self.clock.now();
        self.pending.retain(|_, t| now - t.issued_at <= self.ttl);
        self.armed.retain(|_, a| now <= a.until);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
