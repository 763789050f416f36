//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::{Config, PersistenceBackend, PlatformBackend};
use thiserror::Error;

/// Upper bound for any configured duration (one year).
const MAX_DURATION_SECS: u64 = 365 * 86_400;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("lifecycle.ttl_secs must be greater than 0")]
    ZeroTtl,
    #[error("lifecycle.notice_lead_secs ({notice}) must be less than ttl_secs ({ttl})")]
    NoticeLeadTooLong { notice: u64, ttl: u64 },
    #[error("lifecycle.extension_window_secs ({window}) must not exceed ttl_secs ({ttl})")]
    ExtensionWindowTooLong { window: u64, ttl: u64 },
    #[error("lifecycle.inactive_days must be greater than 0")]
    ZeroInactiveDays,
    #[error("lifecycle.sponsor_inactive_days ({sponsor}) must be at least inactive_days ({standard})")]
    SponsorAllowanceTooShort { sponsor: u32, standard: u32 },
    #[error("{field} exceeds the maximum of one year")]
    DurationOutOfRange { field: &'static str },
    #[error("lifecycle.channel_prefix must not be empty")]
    EmptyChannelPrefix,
    #[error("scheduler.sweep_interval_secs must be greater than 0")]
    ZeroSweepInterval,
    #[error("platform.token is required for the discord backend")]
    MissingToken,
    #[error("persistence.path parent directory does not exist: {0}")]
    PersistencePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let lifecycle = &config.lifecycle;

    for (field, value) in [
        ("lifecycle.ttl_secs", lifecycle.ttl_secs),
        ("lifecycle.extension_window_secs", lifecycle.extension_window_secs),
        ("lifecycle.notice_lead_secs", lifecycle.notice_lead_secs),
        ("lifecycle.delete_grace_secs", lifecycle.delete_grace_secs),
        ("lifecycle.confirm_ttl_secs", lifecycle.confirm_ttl_secs),
        ("lifecycle.sponsor_inactive_days", u64::from(lifecycle.sponsor_inactive_days) * 86_400),
        ("scheduler.sweep_interval_secs", config.scheduler.sweep_interval_secs),
    ] {
        if value > MAX_DURATION_SECS {
            errors.push(ValidationError::DurationOutOfRange { field });
        }
    }

    if lifecycle.ttl_secs == 0 {
        errors.push(ValidationError::ZeroTtl);
    }
    if lifecycle.notice_lead_secs >= lifecycle.ttl_secs {
        errors.push(ValidationError::NoticeLeadTooLong {
            notice: lifecycle.notice_lead_secs,
            ttl: lifecycle.ttl_secs,
        });
    }
    if lifecycle.extension_window_secs > lifecycle.ttl_secs {
        errors.push(ValidationError::ExtensionWindowTooLong {
            window: lifecycle.extension_window_secs,
            ttl: lifecycle.ttl_secs,
        });
    }
    if lifecycle.inactive_days == 0 {
        errors.push(ValidationError::ZeroInactiveDays);
    }
    if lifecycle.sponsor_inactive_days < lifecycle.inactive_days {
        errors.push(ValidationError::SponsorAllowanceTooShort {
            sponsor: lifecycle.sponsor_inactive_days,
            standard: lifecycle.inactive_days,
        });
    }
    if lifecycle.channel_prefix.trim().is_empty() {
        errors.push(ValidationError::EmptyChannelPrefix);
    }

    if config.scheduler.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroSweepInterval);
    }

    if config.platform.backend == PlatformBackend::Discord
        && config
            .platform
            .token
            .as_deref()
            .is_none_or(|t| t.trim().is_empty())
    {
        errors.push(ValidationError::MissingToken);
    }

    // Persistence path validation
    if config.persistence.backend != PersistenceBackend::None {
        let path = &config.persistence.path;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            errors.push(ValidationError::PersistencePathInvalid(
                path.display().to_string(),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
