//! Integration test common infrastructure.
//!
//! Provides a lifecycle daemon wired to the in-memory platform and a manual
//! clock, plus helpers for asserting on what it posted.

pub mod daemon;

#[allow(unused_imports)]
pub use daemon::{TestDaemon, t0};
