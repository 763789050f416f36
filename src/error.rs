//! Unified error handling for pvchd.
//!
//! Every lifecycle operation returns a typed [`LifecycleError`]; nothing in
//! the core panics or aborts the process. Each variant carries a metric label
//! and a user-facing message for the command layer.

use crate::platform::{ChannelRef, PlatformError};
use chrono::{DateTime, Utc};
use thiserror::Error;

// ============================================================================
// Lifecycle Errors (registry / state machine)
// ============================================================================

/// Errors returned by the lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("private channel already exists: {channel}")]
    AlreadyExists { channel: ChannelRef },

    #[error("no private channel found")]
    NotFound,

    #[error("extension not allowed before {eligible_at}")]
    TooEarly { eligible_at: DateTime<Utc> },

    #[error("channel creation failed: {0}")]
    CreationFailed(PlatformError),

    #[error("platform call failed: {0}")]
    External(PlatformError),

    #[error("not authorized")]
    Unauthorized,

    /// The command was issued from a channel where it is not allowed.
    #[error("command not allowed here")]
    WrongChannel,

    #[error("the owner cannot leave their own private channel")]
    OwnerCannotLeave,

    #[error("confirmation expired or unknown")]
    ConfirmationExpired,

    /// The lifecycle actor has shut down.
    #[error("lifecycle manager is not running")]
    ActorGone,
}

impl LifecycleError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyExists { .. } => "already_exists",
            Self::NotFound => "not_found",
            Self::TooEarly { .. } => "too_early",
            Self::CreationFailed(_) => "creation_failed",
            Self::External(_) => "external_failure",
            Self::Unauthorized => "unauthorized",
            Self::WrongChannel => "wrong_channel",
            Self::OwnerCannotLeave => "owner_cannot_leave",
            Self::ConfirmationExpired => "confirmation_expired",
            Self::ActorGone => "actor_gone",
        }
    }

    /// Text shown to the user who issued the command.
    pub fn user_message(&self) -> String {
        match self {
            Self::AlreadyExists { channel } => format!(
                "Your private channel <#{channel}> already exists.\n\nHint: use `delete` to remove it first."
            ),
            Self::NotFound => {
                "You don't seem to have a private channel yet.\n\nHint: use `create` to make one.".to_string()
            }
            Self::TooEarly { eligible_at } => format!(
                "This channel cannot be extended yet. Extension opens at {}.",
                crate::messages::format_deadline(*eligible_at)
            ),
            Self::CreationFailed(_) => "Failed to create the private channel.".to_string(),
            Self::External(_) => "The operation failed. Please try again later.".to_string(),
            Self::Unauthorized => {
                "You cannot do that to someone else's private channel.".to_string()
            }
            Self::WrongChannel => "This command cannot be used in this channel.".to_string(),
            Self::OwnerCannotLeave => {
                "The creator cannot leave their own private channel.\n\nHint: use `delete` instead.".to_string()
            }
            Self::ConfirmationExpired => {
                "That confirmation has expired. Please request the deletion again.".to_string()
            }
            Self::ActorGone => "The service is shutting down.".to_string(),
        }
    }
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

// ============================================================================
// Checkpoint Errors (persistence)
// ============================================================================

/// Errors raised by checkpoint stores.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("corrupt checkpoint entry: {0}")]
    Corrupt(String),
}
