//! State management module.
//!
//! Contains the channel registry, the lifecycle actor that owns it, and the
//! handle through which everything else talks to that actor.

pub mod actor;
mod confirm;
mod handle;
mod record;
mod registry;
pub mod settings;

pub use actor::{
    BatchOutcome, CreationOutcome, DeleteReason, DeletionOutcome, ExtendOutcome, SweepReport,
};
pub use confirm::{Cancelled, DeleteConfirmations};
pub use handle::LifecycleHandle;
pub use record::{ChannelRecord, ChannelState};
pub use registry::Registry;
pub use settings::{GuildScope, LifecycleSettings};
