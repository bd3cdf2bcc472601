// harvester-core/src/infrastructure/alert.rs

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::alert::{Alert, NotificationConfig};
use crate::error::HarvestError;
use crate::ports::alert::AlertSink;

/// Logs every alert at `warn` and notes each enabled notification channel.
///
/// Email, Slack and Teams delivery are not wired; the channel lines mark
/// where a real transport would plug in.
#[derive(Debug, Clone, Default)]
pub struct LogAlertSink {
    notifications: NotificationConfig,
}

impl LogAlertSink {
    pub fn new(notifications: NotificationConfig) -> Self {
        Self { notifications }
    }
}

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn send(&self, alert: &Alert) -> Result<(), HarvestError> {
        warn!(
            alert_type = ?alert.alert_type,
            severity = %alert.severity,
            details = %alert.details,
            "ALERT [{}]: {}",
            alert.severity,
            alert.message
        );
        for channel in self.notifications.enabled_channels() {
            info!(channel, "Would send {} alert: {}", channel, alert.message);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_send_never_fails() {
        let sink = LogAlertSink::new(serde_yaml::from_str("email: { enabled: true }").unwrap());
        let alert = Alert::extraction_failure("boom", json!({ "error": "boom" }));
        assert!(sink.send(&alert).await.is_ok());
    }
}
