// harvester-core/src/domain/pipeline/execution.rs

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::state::PipelineState;
use crate::domain::validation::ValidationSummary;
use crate::domain::validation::report::round2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Extraction,
    Validation,
    Transformation,
    Load,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Extraction => "extraction",
            Phase::Validation => "validation",
            Phase::Transformation => "transformation",
            Phase::Load => "load",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Success,
    Failed,
}

/// One line of the execution log.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionEntry {
    pub timestamp: DateTime<Local>,
    pub phase: Phase,
    pub status: PhaseStatus,
    pub duration_seconds: f64,
    pub details: Map<String, Json>,
    pub error: Option<String>,
}

/// Append-only, ordered record of phase outcomes for a run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ExecutionLog {
    entries: Vec<ExecutionEntry>,
}

impl ExecutionLog {
    pub fn success(&mut self, phase: Phase, duration_seconds: f64, details: Json) {
        self.push(phase, PhaseStatus::Success, duration_seconds, details, None);
    }

    pub fn failure(&mut self, phase: Phase, duration_seconds: f64, error: impl Into<String>) {
        self.push(
            phase,
            PhaseStatus::Failed,
            duration_seconds,
            Json::Null,
            Some(error.into()),
        );
    }

    fn push(
        &mut self,
        phase: Phase,
        status: PhaseStatus,
        duration_seconds: f64,
        details: Json,
        error: Option<String>,
    ) {
        let details = match details {
            Json::Object(map) => map,
            _ => Map::new(),
        };
        self.entries.push(ExecutionEntry {
            timestamp: Local::now(),
            phase,
            status,
            duration_seconds: round2(duration_seconds),
            details,
            error,
        });
    }

    pub fn entries(&self) -> &[ExecutionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed,
}

/// Per-source validation counts as reported in the run summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceValidation {
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
    pub success_rate: f64,
}

impl From<&ValidationSummary> for SourceValidation {
    fn from(s: &ValidationSummary) -> Self {
        Self {
            passed: s.passed,
            failed: s.failed,
            total: s.total_checks,
            success_rate: s.success_rate,
        }
    }
}

/// The persisted post-mortem document of one run, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub duration_seconds: f64,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Where the state machine ended: `completed` or `failed`.
    pub final_state: PipelineState,
    /// The phase that was running when the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_during: Option<PipelineState>,
    pub sources_processed: usize,
    pub rows_extracted: BTreeMap<String, usize>,
    pub total_rows_extracted: usize,
    pub total_rows_loaded: usize,
    pub extraction_errors: BTreeMap<String, String>,
    pub validation_summary: BTreeMap<String, SourceValidation>,
    pub output_paths: BTreeMap<String, Vec<PathBuf>>,
    pub execution_log: ExecutionLog,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}
