// harvester-core/src/infrastructure/checkpoint.rs

use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::domain::ports::CheckpointStore;
use crate::error::HarvestError;
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::fs::atomic_write;

/// Checkpoints in a single JSON object, `{ "source": "ISO-8601 timestamp" }`.
///
/// Every save re-reads the whole file, updates one entry and atomically
/// replaces the file. Only one extraction process may use a given file at a
/// time; there is no locking.
#[derive(Debug, Clone)]
pub struct JsonCheckpointStore {
    path: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, DateTime<Utc>>, InfrastructureError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let raw: BTreeMap<String, String> = serde_json::from_str(&content)?;

        let mut parsed = BTreeMap::new();
        for (source, stamp) in raw {
            match parse_timestamp(&stamp) {
                Some(ts) => {
                    parsed.insert(source, ts);
                }
                None => {
                    return Err(InfrastructureError::ConfigError(format!(
                        "checkpoint for '{}' in {:?} is not an ISO-8601 timestamp: {}",
                        source, self.path, stamp
                    )));
                }
            }
        }
        Ok(parsed)
    }

    fn write(&self, checkpoints: &BTreeMap<String, DateTime<Utc>>) -> Result<(), InfrastructureError> {
        let raw: BTreeMap<&str, String> = checkpoints
            .iter()
            .map(|(k, v)| (k.as_str(), v.to_rfc3339()))
            .collect();
        let content = serde_json::to_string_pretty(&raw)?;
        atomic_write(&self.path, content)
    }
}

/// RFC 3339, or a naive ISO timestamp taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|n| n.and_utc())
        })
}

impl CheckpointStore for JsonCheckpointStore {
    fn get_last_extraction(&self, source: &str) -> Result<Option<DateTime<Utc>>, HarvestError> {
        Ok(self.read()?.get(source).copied())
    }

    fn save_checkpoint(&self, source: &str, when: DateTime<Utc>) -> Result<(), HarvestError> {
        let mut checkpoints = self.read()?;
        if let Some(previous) = checkpoints.insert(source.to_string(), when)
            && previous > when
        {
            warn!(source, %previous, %when, "Checkpoint moved backwards");
        }
        self.write(&checkpoints)?;
        debug!(source, %when, path = ?self.path, "Checkpoint saved");
        Ok(())
    }

    fn all(&self) -> Result<BTreeMap<String, DateTime<Utc>>, HarvestError> {
        Ok(self.read()?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_means_no_checkpoint() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonCheckpointStore::new(dir.path().join("none.json"));
        assert_eq!(store.get_last_extraction("visits")?, None);
        assert!(store.all()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_save_keeps_other_sources() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonCheckpointStore::new(dir.path().join("state/checkpoints.json"));
        let t1 = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 1, 2, 8, 0, 0).unwrap();

        store.save_checkpoint("visits", t1)?;
        store.save_checkpoint("labs", t2)?;
        store.save_checkpoint("visits", t2)?;

        assert_eq!(store.get_last_extraction("visits")?, Some(t2));
        assert_eq!(store.get_last_extraction("labs")?, Some(t2));
        Ok(())
    }

    #[test]
    fn test_reads_naive_iso_timestamps() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("checkpoints.json");
        std::fs::write(&path, r#"{"visits": "2026-01-26T14:30:00.123456"}"#)?;

        let store = JsonCheckpointStore::new(&path);
        let ts = store.get_last_extraction("visits")?.unwrap();
        assert_eq!(ts.format("%Y-%m-%d %H:%M").to_string(), "2026-01-26 14:30");
        Ok(())
    }

    #[test]
    fn test_corrupt_file_is_an_error_not_a_reset() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("checkpoints.json");
        std::fs::write(&path, "{ not json")?;
        let store = JsonCheckpointStore::new(&path);
        assert!(store.get_last_extraction("visits").is_err());
        assert!(store.save_checkpoint("visits", Utc::now()).is_err());
        // Untouched.
        assert_eq!(std::fs::read_to_string(&path)?, "{ not json");
        Ok(())
    }
}
