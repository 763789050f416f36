//! SQLite checkpoint backend.
//!
//! Stores the checkpoint columns in the `private_channels` table. Each save
//! replaces the table contents inside one transaction.

use super::{CheckpointStore, PersistedRecord, PersistedTiming};
use crate::error::CheckpointError;
use crate::platform::{ChannelRef, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Clone)]
pub struct SqliteCheckpoint {
    pool: SqlitePool,
}

impl SqliteCheckpoint {
    /// Connection acquire timeout.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Open (or create) the database at `path` and apply migrations.
    ///
    /// `:memory:` opens a private in-memory database.
    pub async fn open(path: &Path) -> Result<Self, CheckpointError> {
        let options = if path.as_os_str() == ":memory:" {
            // Uniquely named so parallel tests never share a database.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let uri = format!(
                "file:pvchd-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );
            SqliteConnectOptions::new()
                .filename(&uri)
                .shared_cache(true)
                .create_if_missing(true)
        } else {
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Self::ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;

        info!(path = %path.display(), "Checkpoint database connected");
        Ok(Self { pool })
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpoint {
    async fn load(&self) -> Result<Vec<PersistedRecord>, CheckpointError> {
        let rows = sqlx::query(
            r#"
            SELECT owner_id, primary_ref, secondary_ref, created_at, expires_at, notice_sent, last_active_at
            FROM private_channels
            ORDER BY owner_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_row).collect()
    }

    async fn save(&self, records: &[PersistedRecord]) -> Result<(), CheckpointError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM private_channels")
            .execute(&mut *tx)
            .await?;

        for record in records {
            let timing = record.timing;
            sqlx::query(
                r#"
                INSERT INTO private_channels
                    (owner_id, primary_ref, secondary_ref, created_at, expires_at, notice_sent, last_active_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(record.owner.0 as i64)
            .bind(record.primary.0 as i64)
            .bind(record.secondary.map(|c| c.0 as i64))
            .bind(timing.map(|t| t.created_at.timestamp()))
            .bind(timing.map(|t| t.expires_at.timestamp()))
            .bind(timing.map(|t| t.notice_sent))
            .bind(timing.map(|t| t.last_active_at.timestamp()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn decode_row(row: &SqliteRow) -> Result<PersistedRecord, CheckpointError> {
    let owner: i64 = row.try_get("owner_id")?;
    let primary: i64 = row.try_get("primary_ref")?;
    let secondary: Option<i64> = row.try_get("secondary_ref")?;
    let created_at: Option<i64> = row.try_get("created_at")?;
    let expires_at: Option<i64> = row.try_get("expires_at")?;
    let notice_sent: Option<bool> = row.try_get("notice_sent")?;
    let last_active_at: Option<i64> = row.try_get("last_active_at")?;

    let timing = match (created_at, expires_at, notice_sent, last_active_at) {
        (Some(created), Some(expires), Some(notice_sent), Some(active)) => Some(PersistedTiming {
            created_at: timestamp(created, owner)?,
            expires_at: timestamp(expires, owner)?,
            notice_sent,
            last_active_at: timestamp(active, owner)?,
        }),
        _ => None,
    };

    Ok(PersistedRecord {
        owner: UserId(owner as u64),
        primary: ChannelRef(primary as u64),
        secondary: secondary.map(|c| ChannelRef(c as u64)),
        timing,
    })
}

fn timestamp(secs: i64, owner: i64) -> Result<DateTime<Utc>, CheckpointError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| CheckpointError::Corrupt(format!("owner {owner}: bad timestamp {secs}")))
}
