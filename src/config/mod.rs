//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions and loading
//! - [`defaults`]: serde default value functions
//! - [`validation`]: startup checks that report every problem at once

pub mod defaults;
mod types;
pub mod validation;

pub use types::{
    Config, ConfigError, GuildConfig, LifecycleConfig, LogFormat, PersistenceBackend,
    PersistenceConfig, PlatformBackend, PlatformConfig, SchedulerConfig, ServerConfig,
};
pub use validation::{ValidationError, validate};
