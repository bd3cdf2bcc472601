// harvester-core/src/domain/pipeline/metrics.rs

use std::fmt::Display;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use serde::Serialize;

use super::execution::PhaseStatus;
use crate::domain::validation::report::round2;

/// Timing and outcome of one named operation (a phase, a source extraction, the run).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationMetric {
    pub operation: String,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub duration_seconds: f64,
    pub status: PhaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    pub error: Option<String>,
}

impl OperationMetric {
    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == PhaseStatus::Success
    }
}

/// Wall-clock start of an operation plus a monotonic timer for its duration.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started_at: DateTime<Local>,
    timer: Instant,
}

impl Stopwatch {
    pub fn start(at: DateTime<Local>) -> Self {
        Self {
            started_at: at,
            timer: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.timer.elapsed()
    }

    /// Closes the measurement; an `Err` outcome marks the operation failed.
    pub fn stop<T, E: Display>(
        self,
        operation: impl Into<String>,
        ended_at: DateTime<Local>,
        outcome: &Result<T, E>,
    ) -> OperationMetric {
        let (status, error) = match outcome {
            Ok(_) => (PhaseStatus::Success, None),
            Err(e) => (PhaseStatus::Failed, Some(e.to_string())),
        };
        OperationMetric {
            operation: operation.into(),
            start_time: self.started_at,
            end_time: ended_at,
            duration_seconds: round2(self.elapsed().as_secs_f64()),
            status,
            rows: None,
            error,
        }
    }
}

/// Every operation measured during one run, in completion order.
#[derive(Debug, Clone, Default)]
pub struct PerformanceMetrics {
    operations: Vec<OperationMetric>,
}

impl PerformanceMetrics {
    pub fn record(&mut self, metric: OperationMetric) {
        self.operations.push(metric);
    }

    pub fn extend(&mut self, metrics: impl IntoIterator<Item = OperationMetric>) {
        self.operations.extend(metrics);
    }

    pub fn report(self, run_id: &str) -> PerformanceReport {
        let successful = self.operations.iter().filter(|m| m.is_success()).count();
        let slowest = self
            .operations
            .iter()
            .max_by(|a, b| a.duration_seconds.total_cmp(&b.duration_seconds))
            .map(|m| m.operation.clone());
        PerformanceReport {
            run_id: run_id.to_string(),
            total_operations: self.operations.len(),
            successful,
            failed: self.operations.len() - successful,
            slowest_operation: slowest,
            operations: self.operations,
        }
    }
}

/// The persisted `performance_<run_id>.json` document.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub run_id: String,
    pub total_operations: usize,
    pub successful: usize,
    pub failed: usize,
    pub slowest_operation: Option<String>,
    pub operations: Vec<OperationMetric>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(second: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 5, 4, 6, 7, second).unwrap()
    }

    #[test]
    fn test_stop_records_outcome() {
        let ok: Result<(), String> = Ok(());
        let metric = Stopwatch::start(at(0)).stop("extract:visits", at(3), &ok).with_rows(12);
        assert!(metric.is_success());
        assert_eq!(metric.start_time, at(0));
        assert_eq!(metric.end_time, at(3));
        assert_eq!(metric.rows, Some(12));
        assert!(metric.error.is_none());

        let failed: Result<(), String> = Err("table is locked".into());
        let metric = Stopwatch::start(at(0)).stop("extract:visits", at(1), &failed);
        assert_eq!(metric.status, PhaseStatus::Failed);
        assert_eq!(metric.error.as_deref(), Some("table is locked"));
    }

    #[test]
    fn test_report_counts_outcomes() {
        let ok: Result<(), String> = Ok(());
        let failed: Result<(), String> = Err("boom".into());
        let mut metrics = PerformanceMetrics::default();
        metrics.record(Stopwatch::start(at(0)).stop("extraction", at(1), &ok));
        metrics.record(Stopwatch::start(at(1)).stop("validation", at(2), &failed));

        let report = metrics.report("20260504_060700");
        assert_eq!(report.total_operations, 2);
        assert_eq!(report.successful, 1);
        assert_eq!(report.failed, 1);
        assert!(report.slowest_operation.is_some());

        let rendered = serde_json::to_value(&report).unwrap();
        assert_eq!(rendered["operations"][1]["status"], "failed");
        assert_eq!(rendered["operations"][1]["error"], "boom");
        assert!(rendered["operations"][0].get("rows").is_none());
    }
}
