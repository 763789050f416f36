//! pvchd - Private Channel Daemon
//!
//! Manages ephemeral, per-user private channels inside a shared community:
//! an owner provisions an isolated channel (optionally paired with a voice
//! channel), invites or removes participants, and the channel is reclaimed
//! after its deadline passes or on request.
//!
//! The lifecycle core lives in [`state`]: a single-writer actor owns the
//! [`state::Registry`] and serializes every create, extend, invite, kick,
//! delete and sweep. The [`scheduler`] drives periodic expiry sweeps and the
//! [`persistence`] layer checkpoints the registry for restart recovery.

pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod http;
pub mod messages;
pub mod metrics;
pub mod persistence;
pub mod platform;
pub mod policy;
pub mod scheduler;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::LifecycleError;
pub use platform::{ChannelRef, Member, PlatformClient, RoleId, UserId};
pub use state::{ChannelRecord, ChannelState, LifecycleHandle, Registry};
