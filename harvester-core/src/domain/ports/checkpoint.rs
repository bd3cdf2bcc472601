use crate::error::HarvestError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Persisted high-water marks, one per source.
///
/// Implementations must make `save_checkpoint` atomic: a failed write never
/// leaves the checkpoints of other sources corrupted.
pub trait CheckpointStore: Send + Sync {
    fn get_last_extraction(&self, source: &str) -> Result<Option<DateTime<Utc>>, HarvestError>;

    /// Overwrites any previous checkpoint for `source`.
    fn save_checkpoint(&self, source: &str, when: DateTime<Utc>) -> Result<(), HarvestError>;

    fn all(&self) -> Result<BTreeMap<String, DateTime<Utc>>, HarvestError>;
}
