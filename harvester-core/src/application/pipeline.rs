// harvester-core/src/application/pipeline.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local, NaiveDate};
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

// Application Services
use crate::application::extraction::{BatchExtractor, ExtractionOutcome};
use crate::application::load::OutputStage;
use crate::application::transform::transform_dataset;

// Domain
use crate::domain::dataset::Dataset;
use crate::domain::error::DomainError;
use crate::domain::pipeline::{
    ExecutionLog, PerformanceMetrics, PerformanceReport, Phase, PipelineState, RunStatus,
    RunSummary, SourceValidation, Stopwatch,
};
use crate::domain::project::{OutputPaths, PipelineConfig, ProjectConfig, SourceConfig};
use crate::domain::validation::DataValidator;

// Infrastructure
use crate::error::HarvestError;
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::fs::atomic_write;

// Ports
use crate::ports::clock::{Clock, SystemClock};

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// `None` means every configured source.
    pub sources: Option<Vec<String>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub incremental: bool,
    pub stop_on_validation_failure: bool,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            sources: None,
            start_date: None,
            end_date: None,
            incremental: true,
            stop_on_validation_failure: false,
        }
    }
}

impl RunRequest {
    /// Defaults taken from the `pipeline` config section.
    pub fn from_config(pipeline: &PipelineConfig) -> Self {
        Self {
            stop_on_validation_failure: pipeline.stop_on_validation_failure,
            ..Self::default()
        }
    }
}

/// Mutable bookkeeping for one run. Becomes the [`RunSummary`].
struct RunContext {
    run_id: String,
    started: DateTime<Local>,
    state: PipelineState,
    failed_during: Option<PipelineState>,
    log: ExecutionLog,
    metrics: PerformanceMetrics,
    rows_extracted: BTreeMap<String, usize>,
    extraction_errors: BTreeMap<String, String>,
    validation: BTreeMap<String, SourceValidation>,
    output_paths: BTreeMap<String, Vec<PathBuf>>,
    total_rows_loaded: usize,
}

impl RunContext {
    fn new(started: DateTime<Local>) -> Self {
        Self {
            run_id: started.format("%Y%m%d_%H%M%S").to_string(),
            started,
            state: PipelineState::Idle,
            failed_during: None,
            log: ExecutionLog::default(),
            metrics: PerformanceMetrics::default(),
            rows_extracted: BTreeMap::new(),
            extraction_errors: BTreeMap::new(),
            validation: BTreeMap::new(),
            output_paths: BTreeMap::new(),
            total_rows_loaded: 0,
        }
    }

    fn advance(&mut self, to: PipelineState) -> Result<(), HarvestError> {
        self.state = self.state.transition(to)?;
        info!(run_id = %self.run_id, state = %self.state, "Pipeline state changed");
        Ok(())
    }

    fn fail(&mut self) {
        if self.state.is_active() {
            self.failed_during = Some(self.state);
            self.state = PipelineState::Failed;
            info!(run_id = %self.run_id, state = %self.state, "Pipeline state changed");
        }
    }

    fn into_summary(self, ended: DateTime<Local>, error: Option<String>) -> RunSummary {
        let duration = (ended - self.started).num_milliseconds() as f64 / 1000.0;
        RunSummary {
            run_id: self.run_id,
            start_time: self.started,
            end_time: ended,
            duration_seconds: duration,
            status: if error.is_none() {
                RunStatus::Success
            } else {
                RunStatus::Failed
            },
            error,
            final_state: self.state,
            failed_during: self.failed_during,
            sources_processed: self.rows_extracted.len(),
            total_rows_extracted: self.rows_extracted.values().sum(),
            rows_extracted: self.rows_extracted,
            total_rows_loaded: self.total_rows_loaded,
            extraction_errors: self.extraction_errors,
            validation_summary: self.validation,
            output_paths: self.output_paths,
            execution_log: self.log,
        }
    }
}

/// Extract, validate, transform and load, in that order, for one request.
pub struct EtlPipeline {
    extractor: BatchExtractor,
    validator: DataValidator,
    output: OutputStage,
    data_sources: BTreeMap<String, SourceConfig>,
    paths: OutputPaths,
    save_raw: bool,
    clock: Arc<dyn Clock>,
}

impl EtlPipeline {
    pub fn new(config: &ProjectConfig, extractor: BatchExtractor, output: OutputStage) -> Self {
        Self {
            extractor,
            validator: DataValidator::new(config.quality_checks.clone(), config.source_rules()),
            output,
            data_sources: config.data_sources.clone(),
            paths: config.output.paths.clone(),
            save_raw: config.pipeline.save_raw,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn extractor(&self) -> &BatchExtractor {
        &self.extractor
    }

    fn now(&self) -> DateTime<Local> {
        self.clock.now().with_timezone(&Local)
    }

    /// Where the summary of `run_id` is written.
    pub fn summary_path(&self, run_id: &str) -> PathBuf {
        self.paths.results.join(format!("etl_summary_{}.json", run_id))
    }

    /// Where the operation timings of `run_id` are written.
    pub fn metrics_path(&self, run_id: &str) -> PathBuf {
        self.paths
            .results
            .join("metrics")
            .join(format!("performance_{}.json", run_id))
    }

    /// Runs every phase and persists the run summary and its performance metrics.
    ///
    /// A failed run still writes both files (status `failed`, the error and
    /// the partial execution log) before the error is returned.
    #[instrument(skip(self))]
    pub async fn run(&self, request: &RunRequest) -> Result<RunSummary, HarvestError> {
        let mut ctx = RunContext::new(self.now());
        info!(run_id = %ctx.run_id, "ETL PIPELINE STARTED - Run ID: {}", ctx.run_id);
        let stopwatch = Stopwatch::start(ctx.started);

        let result = self.execute(request, &mut ctx).await;
        if result.is_err() {
            ctx.fail();
        }

        let ended = self.now();
        ctx.metrics.record(stopwatch.stop("pipeline", ended, &result));
        let report = std::mem::take(&mut ctx.metrics).report(&ctx.run_id);
        let summary = ctx.into_summary(ended, result.as_ref().err().map(|e| e.to_string()));
        let saved = self.save_summary(&summary);
        let metrics_saved = self.save_metrics(&report);

        match result {
            Ok(()) => {
                saved?;
                metrics_saved?;
                info!(
                    run_id = %summary.run_id,
                    duration_seconds = summary.duration_seconds,
                    rows = summary.total_rows_loaded,
                    "ETL PIPELINE COMPLETED SUCCESSFULLY"
                );
                Ok(summary)
            }
            Err(e) => {
                if let Err(save_err) = saved {
                    warn!("Could not save summary of failed run: {}", save_err);
                }
                if let Err(save_err) = metrics_saved {
                    warn!("Could not save metrics of failed run: {}", save_err);
                }
                error!(run_id = %summary.run_id, "ETL PIPELINE FAILED: {}", e);
                Err(e)
            }
        }
    }

    async fn execute(&self, request: &RunRequest, ctx: &mut RunContext) -> Result<(), HarvestError> {
        ctx.advance(PipelineState::Extracting)?;
        let stopwatch = Stopwatch::start(self.now());
        let extracted = self.extraction_phase(request, ctx).await;
        self.record_phase(ctx, Phase::Extraction, stopwatch, &extracted);
        let extracted = extracted?;

        ctx.advance(PipelineState::Validating)?;
        let stopwatch = Stopwatch::start(self.now());
        let validated = self.validation_phase(request, &extracted, ctx);
        self.record_phase(ctx, Phase::Validation, stopwatch, &validated);
        validated?;

        ctx.advance(PipelineState::Transforming)?;
        let stopwatch = Stopwatch::start(self.now());
        let transformed = self.transformation_phase(&extracted, ctx);
        self.record_phase(ctx, Phase::Transformation, stopwatch, &transformed);
        let transformed = transformed?;

        ctx.advance(PipelineState::Loading)?;
        let stopwatch = Stopwatch::start(self.now());
        let loaded = self.load_phase(&transformed, ctx);
        self.record_phase(ctx, Phase::Load, stopwatch, &loaded);
        loaded?;

        ctx.advance(PipelineState::Completed)
    }

    fn record_phase<T>(
        &self,
        ctx: &mut RunContext,
        phase: Phase,
        stopwatch: Stopwatch,
        outcome: &Result<T, HarvestError>,
    ) {
        let metric = stopwatch.stop(phase.as_str(), self.now(), outcome);
        debug!(operation = %metric.operation, duration_seconds = metric.duration_seconds, "Phase timed");
        ctx.metrics.record(metric);
    }

    async fn extraction_phase(
        &self,
        request: &RunRequest,
        ctx: &mut RunContext,
    ) -> Result<ExtractionOutcome, HarvestError> {
        info!("=== Starting Extraction Phase (Run ID: {}) ===", ctx.run_id);
        let started = Instant::now();

        let outcome = self
            .extractor
            .extract_all(
                request.sources.as_deref(),
                request.start_date,
                request.end_date,
                request.incremental,
            )
            .await;

        for (source, data) in &outcome.datasets {
            ctx.rows_extracted.insert(source.clone(), data.row_count());
        }
        ctx.extraction_errors = outcome.errors.clone();
        ctx.metrics.extend(outcome.metrics.iter().cloned());
        let total_rows = outcome.total_rows();
        info!(
            sources = outcome.datasets.len(),
            rows = total_rows,
            "Extraction complete: {} sources, {} total rows",
            outcome.datasets.len(),
            total_rows
        );

        if self.save_raw {
            let at = self.now();
            for (source, data) in &outcome.datasets {
                if data.is_empty() {
                    continue;
                }
                if let Err(e) = self.output.write(source, data, &self.paths.raw, at) {
                    ctx.log
                        .failure(Phase::Extraction, started.elapsed().as_secs_f64(), e.to_string());
                    return Err(e);
                }
            }
        }

        ctx.log.success(
            Phase::Extraction,
            started.elapsed().as_secs_f64(),
            json!({
                "sources": outcome.datasets.keys().collect::<Vec<_>>(),
                "total_rows": total_rows,
                "incremental": request.incremental,
            }),
        );
        Ok(outcome)
    }

    /// Non-incremental sources that extracted cleanly, usable as integrity parents.
    fn reference_pool(&self, extracted: &ExtractionOutcome) -> BTreeMap<String, Dataset> {
        extracted
            .datasets
            .iter()
            .filter(|(source, _)| !extracted.is_failed(source))
            .filter(|(source, _)| {
                self.data_sources
                    .get(source.as_str())
                    .is_some_and(|cfg| !cfg.incremental)
            })
            .map(|(source, data)| (source.clone(), data.clone()))
            .collect()
    }

    fn validation_phase(
        &self,
        request: &RunRequest,
        extracted: &ExtractionOutcome,
        ctx: &mut RunContext,
    ) -> Result<(), HarvestError> {
        info!("=== Starting Validation Phase ===");
        let started = Instant::now();
        let reference = self.reference_pool(extracted);

        for (source, data) in &extracted.datasets {
            if data.is_empty() {
                info!("Skipping validation for empty source: {}", source);
                continue;
            }

            let report = self
                .validator
                .validate_at(data, source, &reference, self.now().naive_local());
            let summary = report.summary();
            info!(
                passed = summary.passed,
                total = summary.total_checks,
                "{}: {}/{} checks passed ({:.1}%)",
                source,
                summary.passed,
                summary.total_checks,
                summary.success_rate
            );
            for failed in summary.results.iter().filter(|r| !r.passed) {
                warn!(source = %source, check = %failed.check_name, "{}", failed);
            }
            ctx.validation.insert(source.clone(), SourceValidation::from(&summary));

            if request.stop_on_validation_failure && report.has_critical_failures() {
                let err: HarvestError = DomainError::CriticalValidationFailure {
                    source_name: source.clone(),
                    failed_checks: report.critical_failures(),
                }
                .into();
                ctx.log
                    .failure(Phase::Validation, started.elapsed().as_secs_f64(), err.to_string());
                return Err(err);
            }
        }

        let total_checks: usize = ctx.validation.values().map(|v| v.total).sum();
        let total_passed: usize = ctx.validation.values().map(|v| v.passed).sum();
        info!("Validation complete: {}/{} checks passed overall", total_passed, total_checks);

        ctx.log.success(
            Phase::Validation,
            started.elapsed().as_secs_f64(),
            json!({
                "sources_validated": ctx.validation.len(),
                "total_checks": total_checks,
                "total_passed": total_passed,
            }),
        );
        Ok(())
    }

    fn transformation_phase(
        &self,
        extracted: &ExtractionOutcome,
        ctx: &mut RunContext,
    ) -> Result<BTreeMap<String, Dataset>, HarvestError> {
        info!("=== Starting Transformation Phase ===");
        let started = Instant::now();
        let stamp = self.now().naive_local();

        let mut transformed = BTreeMap::new();
        for (source, data) in &extracted.datasets {
            match transform_dataset(data, source, &ctx.run_id, stamp) {
                Ok(out) => {
                    transformed.insert(source.clone(), out);
                }
                Err(e) => {
                    ctx.log.failure(
                        Phase::Transformation,
                        started.elapsed().as_secs_f64(),
                        e.to_string(),
                    );
                    return Err(e);
                }
            }
        }

        ctx.total_rows_loaded = transformed.values().map(Dataset::row_count).sum();
        ctx.log.success(
            Phase::Transformation,
            started.elapsed().as_secs_f64(),
            json!({
                "sources_transformed": transformed.len(),
                "total_rows": ctx.total_rows_loaded,
            }),
        );
        Ok(transformed)
    }

    fn load_phase(
        &self,
        transformed: &BTreeMap<String, Dataset>,
        ctx: &mut RunContext,
    ) -> Result<(), HarvestError> {
        info!("=== Starting Load Phase ===");
        let started = Instant::now();
        let at = self.now();

        for (source, data) in transformed {
            if data.is_empty() {
                info!("Skipping load for empty source: {}", source);
                continue;
            }
            match self.output.write(source, data, &self.paths.processed, at) {
                Ok(paths) => {
                    ctx.output_paths.insert(source.clone(), paths);
                }
                Err(e) => {
                    ctx.log
                        .failure(Phase::Load, started.elapsed().as_secs_f64(), e.to_string());
                    return Err(e);
                }
            }
        }

        let formats: Vec<String> = self.output.formats().iter().map(|f| f.to_string()).collect();
        ctx.log.success(
            Phase::Load,
            started.elapsed().as_secs_f64(),
            json!({
                "sources_loaded": ctx.output_paths.len(),
                "output_formats": formats,
                "output_paths": ctx.output_paths,
            }),
        );
        Ok(())
    }

    fn save_summary(&self, summary: &RunSummary) -> Result<(), HarvestError> {
        let path = self.summary_path(&summary.run_id);
        let body = serde_json::to_vec_pretty(summary).map_err(InfrastructureError::from)?;
        atomic_write(&path, body)?;
        info!(path = ?path, "Pipeline summary saved to: {}", path.display());
        Ok(())
    }

    fn save_metrics(&self, report: &PerformanceReport) -> Result<(), HarvestError> {
        let path = self.metrics_path(&report.run_id);
        let body = serde_json::to_vec_pretty(report).map_err(InfrastructureError::from)?;
        atomic_write(&path, body)?;
        info!(
            path = ?path,
            operations = report.total_operations,
            "Performance metrics saved to: {}",
            path.display()
        );
        Ok(())
    }
}
