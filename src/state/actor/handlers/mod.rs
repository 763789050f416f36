//! Lifecycle actor event handlers.
//!
//! Each submodule handles a category of [`LifecycleEvent`](super::LifecycleEvent)
//! messages processed by [`LifecycleActor`](super::LifecycleActor).

use super::*;

pub mod activity;
pub mod create;
pub mod delete;
pub mod extend;
pub mod membership;
pub mod sweep;
