//! Line-oriented checkpoint file.
//!
//! `owner,primary,secondary[,created_at,expires_at,notice_sent,last_active_at]`
//!
//! `secondary` is empty when absent; timestamps are Unix seconds and
//! `notice_sent` is `0` or `1`. Three-column lines are the legacy layout.

use super::{CheckpointStore, PersistedRecord, PersistedTiming};
use crate::error::CheckpointError;
use crate::platform::{ChannelRef, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpoint {
    async fn load(&self) -> Result<Vec<PersistedRecord>, CheckpointError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(path = %self.path.display(), line = index + 1, error = %e, "Skipping checkpoint line");
                }
            }
        }
        Ok(records)
    }

    async fn save(&self, records: &[PersistedRecord]) -> Result<(), CheckpointError> {
        let mut out = String::new();
        for record in records {
            out.push_str(&format_line(record));
            out.push('\n');
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, out).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

pub(crate) fn format_line(record: &PersistedRecord) -> String {
    let secondary = record
        .secondary
        .map(|c| c.to_string())
        .unwrap_or_default();
    match record.timing {
        Some(t) => format!(
            "{},{},{},{},{},{},{}",
            record.owner,
            record.primary,
            secondary,
            t.created_at.timestamp(),
            t.expires_at.timestamp(),
            u8::from(t.notice_sent),
            t.last_active_at.timestamp()
        ),
        None => format!("{},{},{}", record.owner, record.primary, secondary),
    }
}

pub(crate) fn parse_line(line: &str) -> Result<PersistedRecord, CheckpointError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let corrupt = || CheckpointError::Corrupt(line.to_string());

    let (owner, primary, secondary, timing) = match fields.as_slice() {
        [owner, primary, secondary] => (owner, primary, secondary, None),
        [owner, primary, secondary, created, expires, notice, active] => (
            owner,
            primary,
            secondary,
            Some(PersistedTiming {
                created_at: parse_timestamp(created).ok_or_else(corrupt)?,
                expires_at: parse_timestamp(expires).ok_or_else(corrupt)?,
                notice_sent: match *notice {
                    "0" => false,
                    "1" => true,
                    _ => return Err(corrupt()),
                },
                last_active_at: parse_timestamp(active).ok_or_else(corrupt)?,
            }),
        ),
        _ => return Err(corrupt()),
    };

    Ok(PersistedRecord {
        owner: UserId::from_str(owner).map_err(|_| corrupt())?,
        primary: ChannelRef::from_str(primary).map_err(|_| corrupt())?,
        secondary: if secondary.is_empty() {
            None
        } else {
            Some(ChannelRef::from_str(secondary).map_err(|_| corrupt())?)
        },
        timing,
    })
}

fn parse_timestamp(field: &str) -> Option<DateTime<Utc>> {
    field
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn record(owner: u64, secondary: Option<u64>) -> PersistedRecord {
        let t0 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        PersistedRecord {
            owner: UserId(owner),
            primary: ChannelRef(owner * 10),
            secondary: secondary.map(ChannelRef),
            timing: Some(PersistedTiming {
                created_at: t0,
                expires_at: t0 + TimeDelta::hours(24),
                notice_sent: false,
                last_active_at: t0,
            }),
        }
    }

    #[test]
    fn legacy_three_column_line_parses() {
        let parsed = parse_line("111,222,333").unwrap();
        assert_eq!(parsed.owner, UserId(111));
        assert_eq!(parsed.primary, ChannelRef(222));
        assert_eq!(parsed.secondary, Some(ChannelRef(333)));
        assert!(parsed.timing.is_none());

        let parsed = parse_line("111,222,").unwrap();
        assert_eq!(parsed.secondary, None);
    }

    #[test]
    fn full_line_parses() {
        let line = format_line(&record(1, Some(99)));
        assert_eq!(line, "1,10,99,1700000000,1700086400,0,1700000000");
        assert_eq!(parse_line(&line).unwrap(), record(1, Some(99)));
    }

    #[test]
    fn malformed_lines_are_corrupt() {
        for line in ["", "1,2", "a,2,3", "1,2,3,4", "1,2,,5,6,7,8"] {
            assert!(matches!(parse_line(line), Err(CheckpointError::Corrupt(_))), "{line}");
        }
    }

    #[tokio::test]
    async fn save_then_load_restores_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpoint::new(dir.path().join("pvch_data.csv"));

        assert!(store.load().await.unwrap().is_empty());

        let records = vec![record(1, None), record(2, Some(77))];
        store.save(&records).await.unwrap();
        assert_eq!(store.load().await.unwrap(), records);

        store.save(&records[..1]).await.unwrap();
        assert_eq!(store.load().await.unwrap(), records[..1].to_vec());
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn bad_lines_are_skipped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pvch_data.csv");
        std::fs::write(&path, "1,10,\ngarbage\n\n2,20,21\n").unwrap();

        let loaded = FileCheckpoint::new(&path).load().await.unwrap();
        assert_eq!(loaded.len(), 2);
    }
}
