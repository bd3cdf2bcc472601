// harvester-core/src/domain/validation/report.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::fmt;

/// The registry of checks. Criticality is a property of the kind, never of the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "parent", rename_all = "snake_case")]
pub enum CheckKind {
    RowCount,
    NullValues,
    DateRanges,
    Duplicates,
    DataTypes,
    ValueRanges,
    /// `None` is the placeholder emitted when no relationship targets the source.
    ReferentialIntegrity(Option<String>),
}

impl CheckKind {
    /// Failures of these kinds may halt the pipeline.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            CheckKind::RowCount | CheckKind::NullValues | CheckKind::ReferentialIntegrity(_)
        )
    }

    /// Stable, per-run unique check name.
    pub fn name(&self) -> String {
        match self {
            CheckKind::RowCount => "row_count".to_string(),
            CheckKind::NullValues => "null_values".to_string(),
            CheckKind::DateRanges => "date_ranges".to_string(),
            CheckKind::Duplicates => "duplicates".to_string(),
            CheckKind::DataTypes => "data_types".to_string(),
            CheckKind::ValueRanges => "value_ranges".to_string(),
            CheckKind::ReferentialIntegrity(Some(parent)) => {
                format!("referential_integrity_{}", parent)
            }
            CheckKind::ReferentialIntegrity(None) => "referential_integrity".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub check_name: String,
    pub kind: CheckKind,
    pub passed: bool,
    pub message: String,
    pub details: Map<String, Json>,
    pub timestamp: DateTime<Utc>,
}

impl ValidationResult {
    pub fn pass(kind: CheckKind, message: impl Into<String>, details: Json) -> Self {
        Self::new(kind, true, message, details)
    }

    pub fn fail(kind: CheckKind, message: impl Into<String>, details: Json) -> Self {
        Self::new(kind, false, message, details)
    }

    fn new(kind: CheckKind, passed: bool, message: impl Into<String>, details: Json) -> Self {
        let details = match details {
            Json::Object(map) => map,
            Json::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self {
            check_name: kind.name(),
            kind,
            passed,
            message: message.into(),
            details,
            timestamp: Utc::now(),
        }
    }

    /// `false` when the check could not run (missing key columns, missing parent...).
    pub fn was_checked(&self) -> bool {
        self.details
            .get("checked")
            .and_then(Json::as_bool)
            .unwrap_or(true)
    }

    pub fn detail(&self, key: &str) -> Option<&Json> {
        self.details.get(key)
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.passed { "PASSED" } else { "FAILED" };
        write!(f, "[{}] {}: {}", status, self.check_name, self.message)
    }
}

/// Immutable outcome of one validation pass over one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub source: String,
    pub results: Vec<ValidationResult>,
}

impl ValidationReport {
    pub fn new(source: impl Into<String>, results: Vec<ValidationResult>) -> Self {
        Self {
            source: source.into(),
            results,
        }
    }

    pub fn summary(&self) -> ValidationSummary {
        let total_checks = self.results.len();
        let passed = self.results.iter().filter(|r| r.passed).count();
        let failed = total_checks - passed;
        let success_rate = if total_checks > 0 {
            round2(passed as f64 / total_checks as f64 * 100.0)
        } else {
            0.0
        };
        ValidationSummary {
            total_checks,
            passed,
            failed,
            success_rate,
            results: self.results.clone(),
        }
    }

    pub fn has_critical_failures(&self) -> bool {
        self.results
            .iter()
            .any(|r| !r.passed && r.kind.is_critical())
    }

    pub fn critical_failures(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| !r.passed && r.kind.is_critical())
            .map(|r| r.check_name.clone())
            .collect()
    }

    pub fn result(&self, check_name: &str) -> Option<&ValidationResult> {
        self.results.iter().find(|r| r.check_name == check_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_checks: usize,
    pub passed: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub results: Vec<ValidationResult>,
}

pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_report_rate_is_zero() {
        let summary = ValidationReport::new("s", vec![]).summary();
        assert_eq!(summary.total_checks, 0);
        assert_eq!(summary.success_rate, 0.0);
    }

    #[test]
    fn test_criticality_comes_from_kind() {
        // A non-critical check whose name merely looks critical must not halt.
        let report = ValidationReport::new(
            "s",
            vec![
                ValidationResult::fail(CheckKind::ValueRanges, "negative row_count", json!({})),
                ValidationResult::pass(CheckKind::RowCount, "ok", json!({})),
            ],
        );
        assert!(!report.has_critical_failures());

        let report = ValidationReport::new(
            "s",
            vec![ValidationResult::fail(
                CheckKind::ReferentialIntegrity(Some("patients".into())),
                "orphans",
                json!({"orphaned_count": 1}),
            )],
        );
        assert!(report.has_critical_failures());
        assert_eq!(report.critical_failures(), vec!["referential_integrity_patients"]);
    }

    #[test]
    fn test_success_rate_rounding() {
        let report = ValidationReport::new(
            "s",
            vec![
                ValidationResult::pass(CheckKind::RowCount, "", json!({})),
                ValidationResult::pass(CheckKind::DataTypes, "", json!({})),
                ValidationResult::fail(CheckKind::Duplicates, "", json!({})),
            ],
        );
        let summary = report.summary();
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.success_rate, 66.67);
    }

    #[test]
    fn test_checked_flag_defaults_true() {
        let trivial = ValidationResult::pass(CheckKind::Duplicates, "", json!({"checked": false}));
        assert!(!trivial.was_checked());
        let real = ValidationResult::pass(CheckKind::Duplicates, "", json!({"duplicate_count": 0}));
        assert!(real.was_checked());
    }
}
