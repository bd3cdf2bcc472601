// harvester-core/src/domain/alert.rs

use serde::{Deserialize, Serialize};
use serde_json::{Value as Json, json};
use std::fmt;

use crate::domain::pipeline::RunSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    ExtractionFailure,
    QualityCheckFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Medium => f.write_str("medium"),
            Severity::High => f.write_str("high"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub details: Json,
}

impl Alert {
    pub fn extraction_failure(message: impl Into<String>, details: Json) -> Self {
        Self {
            alert_type: AlertType::ExtractionFailure,
            severity: Severity::High,
            message: message.into(),
            details,
        }
    }

    pub fn quality_check_failure(source: &str, details: Json) -> Self {
        Self {
            alert_type: AlertType::QualityCheckFailure,
            severity: Severity::Medium,
            message: format!("Quality checks failed for {}", source),
            details,
        }
    }
}

/// The `monitoring` config section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub alerts: AlertToggles,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertToggles {
    #[serde(default = "enabled")]
    pub extraction_failure: bool,
    #[serde(default = "enabled")]
    pub quality_check_failure: bool,
}

impl Default for AlertToggles {
    fn default() -> Self {
        Self {
            extraction_failure: true,
            quality_check_failure: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub email: ChannelConfig,
    #[serde(default)]
    pub slack: ChannelConfig,
    #[serde(default)]
    pub teams: ChannelConfig,
}

impl NotificationConfig {
    /// Names of the enabled channels, in a stable order.
    pub fn enabled_channels(&self) -> Vec<&'static str> {
        [("email", &self.email), ("slack", &self.slack), ("teams", &self.teams)]
            .into_iter()
            .filter(|(_, c)| c.enabled)
            .map(|(name, _)| name)
            .collect()
    }
}

/// A notification channel. `target` is an address list or webhook URL.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub target: Option<String>,
}

fn enabled() -> bool {
    true
}

/// Decides which alerts a finished run deserves.
#[derive(Debug, Clone, Default)]
pub struct AlertPolicy {
    toggles: AlertToggles,
}

impl AlertPolicy {
    pub fn new(toggles: AlertToggles) -> Self {
        Self { toggles }
    }

    pub fn check_conditions(&self, summary: &RunSummary) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if self.toggles.extraction_failure {
            if !summary.is_success() {
                alerts.push(Alert::extraction_failure(
                    format!(
                        "Data extraction failed: {}",
                        summary.error.as_deref().unwrap_or("unknown error")
                    ),
                    json!({
                        "run_id": summary.run_id,
                        "status": summary.status,
                        "error": summary.error,
                    }),
                ));
            }
            for (source, error) in &summary.extraction_errors {
                alerts.push(Alert::extraction_failure(
                    format!("Extraction failed for {}: {}", source, error),
                    json!({ "run_id": summary.run_id, "source": source, "error": error }),
                ));
            }
        }

        if self.toggles.quality_check_failure {
            for (source, validation) in &summary.validation_summary {
                if validation.failed > 0 {
                    alerts.push(Alert::quality_check_failure(
                        source,
                        serde_json::to_value(validation).unwrap_or(Json::Null),
                    ));
                }
            }
        }

        alerts
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::pipeline::{ExecutionLog, PipelineState, RunStatus, SourceValidation};
    use chrono::Local;
    use std::collections::BTreeMap;

    fn summary(status: RunStatus) -> RunSummary {
        RunSummary {
            run_id: "20260101_020000".into(),
            start_time: Local::now(),
            end_time: Local::now(),
            duration_seconds: 1.0,
            final_state: match status {
                RunStatus::Success => PipelineState::Completed,
                RunStatus::Failed => PipelineState::Failed,
            },
            failed_during: None,
            status,
            error: None,
            sources_processed: 0,
            rows_extracted: BTreeMap::new(),
            total_rows_extracted: 0,
            total_rows_loaded: 0,
            extraction_errors: BTreeMap::new(),
            validation_summary: BTreeMap::new(),
            output_paths: BTreeMap::new(),
            execution_log: ExecutionLog::default(),
        }
    }

    #[test]
    fn test_failed_run_raises_high_alert() {
        let mut s = summary(RunStatus::Failed);
        s.error = Some("connection refused".into());
        let alerts = AlertPolicy::default().check_conditions(&s);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::ExtractionFailure);
        assert_eq!(alerts[0].severity, Severity::High);
        assert!(alerts[0].message.contains("connection refused"));
    }

    #[test]
    fn test_quality_failures_are_per_source_and_toggleable() {
        let mut s = summary(RunStatus::Success);
        let failing = SourceValidation {
            passed: 5,
            failed: 1,
            total: 6,
            success_rate: 83.33,
        };
        let clean = SourceValidation {
            failed: 0,
            passed: 6,
            ..failing.clone()
        };
        s.validation_summary.insert("visits".into(), failing);
        s.validation_summary.insert("patients".into(), clean);

        let alerts = AlertPolicy::default().check_conditions(&s);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, "Quality checks failed for visits");
        assert_eq!(alerts[0].severity, Severity::Medium);

        let quiet = AlertPolicy::new(AlertToggles {
            extraction_failure: true,
            quality_check_failure: false,
        });
        assert!(quiet.check_conditions(&s).is_empty());
    }

    #[test]
    fn test_source_extraction_errors_alert() {
        let mut s = summary(RunStatus::Success);
        s.extraction_errors.insert("labs".into(), "timeout".into());
        let alerts = AlertPolicy::default().check_conditions(&s);
        assert_eq!(alerts.len(), 1);
        assert_eq!(serde_json::to_value(&alerts[0]).unwrap()["type"], "extraction_failure");
    }

    #[test]
    fn test_enabled_channels() {
        let cfg: NotificationConfig =
            serde_yaml::from_str("slack: { enabled: true, target: 'https://hooks' }").unwrap();
        assert_eq!(cfg.enabled_channels(), vec!["slack"]);
    }
}
