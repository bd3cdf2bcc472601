// harvester-core/src/ports/alert.rs

use crate::domain::alert::Alert;
use crate::error::HarvestError;
use async_trait::async_trait;

/// Delivers alerts. Delivery failures are reported, never retried here.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), HarvestError>;
}
