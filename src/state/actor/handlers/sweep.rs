//! Expiry sweep tick.
//!
//! Evaluates every record against the policy, posts one-time notices and
//! force-deletes expired channels. One failed deletion never aborts the
//! rest of the tick; the record stays and is retried next tick.

use super::{DeleteReason, LifecycleActor, SweepReport};
use crate::messages;
use crate::policy::{AllowanceClass, ExpiryPolicy, Verdict};
use crate::platform::UserId;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

impl LifecycleActor {
    pub(crate) async fn handle_sweep(&mut self, now: DateTime<Utc>) -> SweepReport {
        let started = Instant::now();
        self.refresh_allowances().await;

        let snapshot = self.registry.snapshot();
        let mut report = SweepReport {
            evaluated: snapshot.len(),
            ..SweepReport::default()
        };

        let mut expired = Vec::new();
        for record in &snapshot {
            match self
                .settings
                .policy
                .evaluate(now, record.expires_at, record.notice_sent)
            {
                Verdict::Expire => expired.push(record.owner),
                // Already on its way out.
                Verdict::Notice if record.is_pending_delete() => {}
                Verdict::Notice => {
                    if self.registry.mark_notice_sent(record.owner) {
                        self.dirty = true;
                        self.post(record.primary, &messages::expiry_notice(record.expires_at))
                            .await;
                        crate::metrics::inc_notices();
                        report.notices.push(record.owner);
                    }
                }
                Verdict::Keep => {}
            }
        }

        for owner in expired {
            match self.force_delete(owner, DeleteReason::Expired).await {
                Ok(_) => report.deleted.push(owner),
                Err(e) => {
                    warn!(owner = %owner, error = %e, "Expired channel not deleted; retrying next sweep");
                    report.failed.push(owner);
                }
            }
        }

        if self.dirty {
            self.checkpoint().await;
        }

        crate::metrics::observe_sweep(started.elapsed().as_secs_f64());
        if report.is_quiet() {
            debug!(evaluated = report.evaluated, "Sweep complete");
        } else {
            info!(
                evaluated = report.evaluated,
                notices = report.notices.len(),
                deleted = report.deleted.len(),
                failed = report.failed.len(),
                "Sweep complete"
            );
        }
        report
    }

    /// Re-classify owners against the sponsor role.
    ///
    /// Only meaningful under the inactivity policy. A failed lookup keeps
    /// the current classes.
    async fn refresh_allowances(&mut self) {
        if self.settings.policy.kind != ExpiryPolicy::Inactivity || self.registry.is_empty() {
            return;
        }
        let Some(role) = self.settings.guild.sponsor_role else {
            return;
        };

        let sponsors: HashSet<UserId> = match self.platform.list_privileged_members(role).await {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                crate::metrics::record_external_failure("list_privileged_members");
                warn!(error = %e, "Failed to list sponsors; keeping current allowances");
                return;
            }
        };

        let owners: Vec<UserId> = self.registry.iter().map(|r| r.owner).collect();
        for owner in owners {
            let class = if sponsors.contains(&owner) {
                AllowanceClass::Sponsor
            } else {
                AllowanceClass::Standard
            };
            if self
                .registry
                .apply_allowance(owner, class, &self.settings.policy)
            {
                debug!(owner = %owner, ?class, "Allowance class changed");
                self.dirty = true;
            }
        }
    }
}
