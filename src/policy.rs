//! Clock/TTL policy.
//!
//! Pure functions that turn creation/activity timestamps and configured
//! durations into deadlines, and decide whether a deadline is in its notice
//! window or already passed. Nothing here performs I/O or reads the clock.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

/// Which timestamp a channel's deadline is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryPolicy {
    /// Fixed time-to-live counted from creation.
    #[default]
    Ttl,
    /// Deadline slides forward with observed activity.
    Inactivity,
}

/// Member category used to pick the inactivity allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllowanceClass {
    #[default]
    Standard,
    /// Privileged members (e.g. server boosters) get the longer allowance.
    Sponsor,
}

/// Inactivity thresholds, in days, per allowance class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InactivityAllowance {
    pub standard_days: u32,
    pub sponsor_days: u32,
}

impl InactivityAllowance {
    pub fn days_for(&self, class: AllowanceClass) -> u32 {
        match class {
            AllowanceClass::Standard => self.standard_days,
            AllowanceClass::Sponsor => self.sponsor_days,
        }
    }
}

/// What the sweep should do with a record right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    Notice,
    Expire,
}

pub fn compute_initial_expiry(created_at: DateTime<Utc>, ttl: TimeDelta) -> DateTime<Utc> {
    created_at + ttl
}

pub fn compute_extended_expiry(now: DateTime<Utc>, extension_window: TimeDelta) -> DateTime<Utc> {
    now + extension_window
}

/// `expires_at - notice_lead <= now < expires_at`
pub fn is_in_notice_window(
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    notice_lead: TimeDelta,
) -> bool {
    expires_at - notice_lead <= now && now < expires_at
}

pub fn is_expired(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> bool {
    now >= expires_at
}

pub fn compute_inactivity_deadline(
    last_active_at: DateTime<Utc>,
    class: AllowanceClass,
    allowance: InactivityAllowance,
) -> DateTime<Utc> {
    last_active_at + TimeDelta::days(i64::from(allowance.days_for(class)))
}

/// The configured lifecycle policy, bundling the pure functions above with
/// their parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    pub kind: ExpiryPolicy,
    pub ttl: TimeDelta,
    pub extension_window: TimeDelta,
    pub notice_lead: TimeDelta,
    pub inactivity: InactivityAllowance,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            kind: ExpiryPolicy::Ttl,
            ttl: TimeDelta::hours(24),
            extension_window: TimeDelta::hours(6),
            notice_lead: TimeDelta::minutes(15),
            inactivity: InactivityAllowance {
                standard_days: 7,
                sponsor_days: 14,
            },
        }
    }
}

impl LifecyclePolicy {
    /// Deadline for a freshly created (or freshly reloaded) channel.
    pub fn initial_deadline(&self, created_at: DateTime<Utc>, class: AllowanceClass) -> DateTime<Utc> {
        match self.kind {
            ExpiryPolicy::Ttl => compute_initial_expiry(created_at, self.ttl),
            ExpiryPolicy::Inactivity => {
                compute_inactivity_deadline(created_at, class, self.inactivity)
            }
        }
    }

    /// Deadline implied by activity at `last_active_at`, if this policy tracks
    /// activity at all.
    pub fn activity_deadline(
        &self,
        last_active_at: DateTime<Utc>,
        class: AllowanceClass,
    ) -> Option<DateTime<Utc>> {
        match self.kind {
            ExpiryPolicy::Ttl => None,
            ExpiryPolicy::Inactivity => Some(compute_inactivity_deadline(
                last_active_at,
                class,
                self.inactivity,
            )),
        }
    }

    /// Earliest instant at which an extension may be requested.
    pub fn extension_opens_at(&self, expires_at: DateTime<Utc>) -> DateTime<Utc> {
        expires_at - self.extension_window
    }

    /// New deadline for an extension requested at `now`.
    ///
    /// Returns `Err(eligible_at)` when the record has not yet entered its
    /// final extension window, or when the new deadline would not move past
    /// the current one.
    pub fn try_extend(
        &self,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, DateTime<Utc>> {
        let opens_at = self.extension_opens_at(expires_at);
        if now < opens_at {
            return Err(opens_at);
        }
        let extended = compute_extended_expiry(now, self.extension_window);
        if extended <= expires_at {
            return Err(opens_at);
        }
        Ok(extended)
    }

    pub fn evaluate(&self, now: DateTime<Utc>, expires_at: DateTime<Utc>, notice_sent: bool) -> Verdict {
        if is_expired(now, expires_at) {
            Verdict::Expire
        } else if !notice_sent && is_in_notice_window(now, expires_at, self.notice_lead) {
            Verdict::Notice
        } else {
            Verdict::Keep
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn notice_window_is_half_open() {
        let expires = t0() + TimeDelta::hours(24);
        let lead = TimeDelta::minutes(15);
        assert!(!is_in_notice_window(expires - TimeDelta::minutes(16), expires, lead));
        assert!(is_in_notice_window(expires - lead, expires, lead));
        assert!(is_in_notice_window(expires - TimeDelta::seconds(1), expires, lead));
        assert!(!is_in_notice_window(expires, expires, lead));
    }

    #[test]
    fn expiry_is_inclusive() {
        let expires = t0();
        assert!(!is_expired(expires - TimeDelta::seconds(1), expires));
        assert!(is_expired(expires, expires));
    }

    #[test]
    fn sponsor_gets_longer_inactivity_allowance() {
        let allowance = InactivityAllowance {
            standard_days: 7,
            sponsor_days: 14,
        };
        assert_eq!(
            compute_inactivity_deadline(t0(), AllowanceClass::Standard, allowance),
            t0() + TimeDelta::days(7)
        );
        assert_eq!(
            compute_inactivity_deadline(t0(), AllowanceClass::Sponsor, allowance),
            t0() + TimeDelta::days(14)
        );
    }

    #[test]
    fn extend_too_early_reports_window_opening() {
        let policy = LifecyclePolicy::default();
        let expires = policy.initial_deadline(t0(), AllowanceClass::Standard);

        let err = policy
            .try_extend(expires, t0() + TimeDelta::hours(10))
            .unwrap_err();
        assert_eq!(err, t0() + TimeDelta::hours(18));
    }

    #[test]
    fn extend_inside_window_moves_deadline() {
        let policy = LifecyclePolicy::default();
        let expires = policy.initial_deadline(t0(), AllowanceClass::Standard);

        let now = t0() + TimeDelta::hours(19);
        let extended = policy.try_extend(expires, now).unwrap();
        assert_eq!(extended, now + TimeDelta::hours(6));
        assert!(extended > expires);
    }

    #[test]
    fn extend_at_window_opening_is_rejected_when_it_would_not_move() {
        let policy = LifecyclePolicy::default();
        let expires = t0() + TimeDelta::hours(24);
        // At exactly T0+18h the new deadline equals the current one.
        assert!(policy.try_extend(expires, t0() + TimeDelta::hours(18)).is_err());
    }

    #[test]
    fn evaluate_scenario() {
        let policy = LifecyclePolicy::default();
        let expires = policy.initial_deadline(t0(), AllowanceClass::Standard);

        assert_eq!(policy.evaluate(t0() + TimeDelta::hours(1), expires, false), Verdict::Keep);
        let notice_at = t0() + TimeDelta::hours(23) + TimeDelta::minutes(45);
        assert_eq!(policy.evaluate(notice_at, expires, false), Verdict::Notice);
        assert_eq!(policy.evaluate(notice_at, expires, true), Verdict::Keep);
        assert_eq!(policy.evaluate(expires, expires, true), Verdict::Expire);
    }

    #[test]
    fn ttl_policy_ignores_activity() {
        let policy = LifecyclePolicy::default();
        assert_eq!(policy.activity_deadline(t0(), AllowanceClass::Standard), None);

        let inactivity = LifecyclePolicy {
            kind: ExpiryPolicy::Inactivity,
            ..policy
        };
        assert_eq!(
            inactivity.activity_deadline(t0(), AllowanceClass::Standard),
            Some(t0() + TimeDelta::days(7))
        );
    }
}
