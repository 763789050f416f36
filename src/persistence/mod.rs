//! Registry checkpointing.
//!
//! The registry is rewritten in full after every mutation so a restart can
//! rebuild it. Two durable backends are provided:
//! - [`FileCheckpoint`]: one comma-separated line per record
//! - [`SqliteCheckpoint`]: the same columns in the `private_channels` table
//!
//! On startup [`restore`] reloads the checkpoint and reconciles it against
//! the platform, dropping records whose channels no longer exist.

mod file;
mod sqlite;

pub use file::FileCheckpoint;
pub use sqlite::SqliteCheckpoint;

use crate::config::{PersistenceBackend, PersistenceConfig};
use crate::error::CheckpointError;
use crate::platform::{ChannelRef, PlatformClient, UserId};
use crate::policy::{AllowanceClass, LifecyclePolicy};
use crate::state::{ChannelRecord, Registry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Lifecycle timing carried by newer checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedTiming {
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub notice_sent: bool,
    pub last_active_at: DateTime<Utc>,
}

/// One checkpointed record.
///
/// `timing` is `None` for legacy three-column entries; their deadline is
/// recomputed from the channel's creation time on restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedRecord {
    pub owner: UserId,
    pub primary: ChannelRef,
    pub secondary: Option<ChannelRef>,
    pub timing: Option<PersistedTiming>,
}

impl From<&ChannelRecord> for PersistedRecord {
    fn from(record: &ChannelRecord) -> Self {
        Self {
            owner: record.owner,
            primary: record.primary,
            secondary: record.secondary,
            timing: Some(PersistedTiming {
                created_at: record.created_at,
                expires_at: record.expires_at,
                notice_sent: record.notice_sent,
                last_active_at: record.last_active_at,
            }),
        }
    }
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self) -> Result<Vec<PersistedRecord>, CheckpointError>;

    /// Replace the stored checkpoint with `records`.
    async fn save(&self, records: &[PersistedRecord]) -> Result<(), CheckpointError>;
}

/// Persistence disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCheckpoint;

#[async_trait]
impl CheckpointStore for NoCheckpoint {
    async fn load(&self) -> Result<Vec<PersistedRecord>, CheckpointError> {
        Ok(Vec::new())
    }

    async fn save(&self, _records: &[PersistedRecord]) -> Result<(), CheckpointError> {
        Ok(())
    }
}

/// Open the backend selected in the configuration.
pub async fn open(config: &PersistenceConfig) -> Result<Arc<dyn CheckpointStore>, CheckpointError> {
    let store: Arc<dyn CheckpointStore> = match config.backend {
        PersistenceBackend::File => Arc::new(FileCheckpoint::new(&config.path)),
        PersistenceBackend::Sqlite => Arc::new(SqliteCheckpoint::open(&config.path).await?),
        PersistenceBackend::None => Arc::new(NoCheckpoint),
    };
    info!(backend = ?config.backend, path = %config.path.display(), "Checkpoint store ready");
    Ok(store)
}

/// Rebuild the registry from the checkpoint.
///
/// Records are dropped when their primary channel, or their voice channel
/// when one is recorded, no longer exists. Surviving channels are left
/// alone. If anything was dropped the checkpoint is rewritten.
pub async fn restore(
    store: &dyn CheckpointStore,
    platform: &dyn PlatformClient,
    policy: &LifecyclePolicy,
    now: DateTime<Utc>,
) -> Result<Registry, CheckpointError> {
    let persisted = store.load().await?;
    let total = persisted.len();
    let mut registry = Registry::new();
    let mut dropped = 0usize;

    for entry in persisted {
        let primary_alive = platform.channel_exists(entry.primary).await;
        let secondary_alive = match entry.secondary {
            Some(voice) => platform.channel_exists(voice).await,
            None => true,
        };
        if !primary_alive || !secondary_alive {
            info!(owner = %entry.owner, channel = %entry.primary, "Dropping record for vanished channel");
            dropped += 1;
            continue;
        }

        let record = match entry.timing {
            Some(timing) => {
                let mut record = ChannelRecord::new(
                    entry.owner,
                    entry.primary,
                    entry.secondary,
                    timing.created_at,
                    timing.expires_at,
                );
                record.notice_sent = timing.notice_sent;
                record.last_active_at = timing.last_active_at;
                record
            }
            None => {
                let created_at = platform
                    .channel_created_at(entry.primary)
                    .await
                    .unwrap_or(now);
                let expires_at = policy.initial_deadline(created_at, AllowanceClass::Standard);
                ChannelRecord::new(entry.owner, entry.primary, entry.secondary, created_at, expires_at)
            }
        };

        if let Err(e) = registry.insert(record) {
            warn!(owner = %entry.owner, error = %e, "Duplicate owner in checkpoint; keeping first entry");
            dropped += 1;
        }
    }

    if dropped > 0 {
        let records: Vec<PersistedRecord> = registry.iter().map(PersistedRecord::from).collect();
        store.save(&records).await?;
    }

    info!(loaded = registry.len(), dropped, total, "Registry restored from checkpoint");
    Ok(registry)
}
