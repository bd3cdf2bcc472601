// harvester-core/src/application/scheduler.rs

use std::future::Future;
use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::application::pipeline::{EtlPipeline, RunRequest};
use crate::domain::alert::{Alert, AlertPolicy};
use crate::domain::pipeline::RunSummary;
use crate::domain::schedule::{JobKind, ScheduledJob};
use crate::error::HarvestError;
use crate::ports::alert::AlertSink;

/// Fires the configured jobs against one pipeline and routes their alerts.
pub struct Scheduler {
    pipeline: EtlPipeline,
    jobs: Vec<ScheduledJob>,
    policy: AlertPolicy,
    alerts: Arc<dyn AlertSink>,
}

impl Scheduler {
    pub fn new(
        pipeline: EtlPipeline,
        jobs: Vec<ScheduledJob>,
        policy: AlertPolicy,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            pipeline,
            jobs,
            policy,
            alerts,
        }
    }

    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    /// The job due first after `after`, with its fire time. Ties go to the
    /// job declared first (daily, weekly, monthly).
    pub fn next_due(&self, after: NaiveDateTime) -> Option<(&ScheduledJob, NaiveDateTime)> {
        self.jobs
            .iter()
            .filter_map(|job| job.next_occurrence(after).map(|at| (job, at)))
            .min_by_key(|(_, at)| *at)
    }

    /// The pipeline request a job makes when it fires on `today`.
    pub fn request_for(job: &ScheduledJob, today: NaiveDate) -> RunRequest {
        let (start_date, end_date) = job.plan.window(today);
        RunRequest {
            sources: job.plan.sources.clone(),
            start_date,
            end_date,
            incremental: job.plan.incremental,
            stop_on_validation_failure: false,
        }
    }

    /// Runs one job now. Alerts are dispatched either way; a failed run also
    /// raises an extraction failure alert with the job's severity.
    #[instrument(skip(self, job), fields(job = %job.kind))]
    pub async fn run_job(&self, job: &ScheduledJob) -> Result<RunSummary, HarvestError> {
        info!("=== Starting {} extraction job ===", job.kind);
        let request = Self::request_for(job, Local::now().date_naive());

        match self.pipeline.run(&request).await {
            Ok(summary) => {
                info!(status = ?summary.status, "{} extraction completed", job.kind);
                for alert in self.policy.check_conditions(&summary) {
                    self.dispatch(&alert).await;
                }
                Ok(summary)
            }
            Err(e) => {
                error!("{} extraction failed: {}", job.kind, e);
                let mut alert = Alert::extraction_failure(
                    format!("{} extraction failed: {}", capitalize(job.kind), e),
                    json!({ "error": e.to_string() }),
                );
                alert.severity = job.plan.failure_severity;
                self.dispatch(&alert).await;
                Err(e)
            }
        }
    }

    /// Runs every job once, in declaration order. Failures are already
    /// alerted and do not stop the remaining jobs.
    pub async fn run_all(&self) {
        for job in &self.jobs {
            let _ = self.run_job(job).await;
        }
    }

    /// Sleeps until the next due job, runs it, and repeats until `shutdown`
    /// resolves.
    pub async fn run_until<S>(&self, shutdown: S) -> Result<(), HarvestError>
    where
        S: Future<Output = ()>,
    {
        if self.jobs.is_empty() {
            warn!("No scheduled jobs are enabled");
            return Ok(());
        }
        tokio::pin!(shutdown);

        loop {
            let now = Local::now().naive_local();
            let Some((job, at)) = self.next_due(now) else {
                warn!("No future occurrence for any job, stopping");
                return Ok(());
            };
            info!(job = %job.kind, next_run = %at, "Next run scheduled");

            let wait = (at - now).to_std().unwrap_or_default();
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Scheduler stopped");
                    return Ok(());
                }
                _ = tokio::time::sleep(wait) => {
                    let _ = self.run_job(job).await;
                }
            }
        }
    }

    async fn dispatch(&self, alert: &Alert) {
        if let Err(e) = self.alerts.send(alert).await {
            warn!("Failed to send alert: {}", e);
        }
    }
}

fn capitalize(kind: JobKind) -> String {
    let name = kind.to_string();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => name,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::alert::{AlertToggles, AlertType, Severity};
    use crate::domain::dataset::{Dataset, Value};
    use crate::domain::project::{ProjectConfig, QueryCatalog};
    use crate::domain::retry::{Backoff, RetryPolicy};
    use crate::domain::schedule::ScheduleConfig;
    use crate::application::extraction::BatchExtractor;
    use crate::application::load::OutputStage;
    use crate::domain::ports::CheckpointStore;
    use crate::infrastructure::checkpoint::JsonCheckpointStore;
    use crate::infrastructure::compiler::jinja::JinjaRenderer;
    use crate::ports::source::{ExtractionSource, PageRequest};
    use crate::ports::writer::{DatasetWriter, OutputFormat};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};

    struct StaticSource {
        rows: usize,
        fail: bool,
    }

    #[async_trait]
    impl ExtractionSource for StaticSource {
        async fn fetch_page(&self, request: &PageRequest) -> Result<Dataset, HarvestError> {
            self.fetch_all(&request.sql).await.map(|all| {
                let rows = all.rows().iter().skip(request.offset).take(request.limit).cloned().collect();
                Dataset::new(all.columns().to_vec(), rows).unwrap()
            })
        }

        async fn fetch_all(&self, _sql: &str) -> Result<Dataset, HarvestError> {
            if self.fail {
                return Err(HarvestError::Extraction {
                    source_name: "visits".into(),
                    message: "down".into(),
                });
            }
            let rows = (0..self.rows).map(|i| vec![Value::Integer(i as i64)]).collect();
            Ok(Dataset::new(vec!["visit_id".into()], rows).unwrap())
        }
    }

    struct NullWriter;

    impl DatasetWriter for NullWriter {
        fn write(&self, _: &Dataset, _: &Path, _: OutputFormat) -> Result<(), HarvestError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CollectingSink(Mutex<Vec<Alert>>);

    #[async_trait]
    impl AlertSink for CollectingSink {
        async fn send(&self, alert: &Alert) -> Result<(), HarvestError> {
            self.0.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    fn project(dir: &Path) -> ProjectConfig {
        serde_yaml::from_str(&format!(
            r#"
extraction:
  incremental: {{ checkpoint_file: "{root}/checkpoints.json" }}
data_sources:
  visits: {{ table: visits, incremental: true, primary_key: visit_id }}
quality_checks:
  row_count: {{ min_rows: 5 }}
output:
  paths: {{ raw: "{root}/raw", processed: "{root}/processed", results: "{root}/results" }}
schedule:
  daily: {{ enabled: true, time: "02:00", extractions: [all] }}
  monthly: {{ enabled: true, day: 1, time: "03:00", extractions: [visits] }}
"#,
            root = dir.display()
        ))
        .unwrap()
    }

    fn scheduler(rows: usize, fail: bool) -> (Scheduler, Arc<CollectingSink>, TempDir) {
        let dir = tempdir().unwrap();
        let config = project(dir.path());
        let queries: QueryCatalog = serde_yaml::from_str(
            "queries: { visits: { full_query: \"SELECT * FROM {{ table }} LIMIT {{ batch_size }} OFFSET {{ batch_offset }}\" } }",
        )
        .unwrap();
        let templates = Arc::new(JinjaRenderer::new());
        let checkpoints = Arc::new(JsonCheckpointStore::new(
            config.extraction.incremental.checkpoint_file.clone(),
        ));
        let extractor = BatchExtractor::new(
            &config,
            queries,
            Arc::new(StaticSource { rows, fail }),
            checkpoints,
            templates.clone(),
        )
        .with_retry(RetryPolicy::new(1, Duration::ZERO, Backoff::Fixed));
        let output = OutputStage::from_config(&config.output, Arc::new(NullWriter), templates).unwrap();
        let pipeline = EtlPipeline::new(&config, extractor, output);

        let sink = Arc::new(CollectingSink::default());
        let scheduler = Scheduler::new(
            pipeline,
            config.schedule.jobs().unwrap(),
            AlertPolicy::new(AlertToggles::default()),
            sink.clone(),
        );
        (scheduler, sink, dir)
    }

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_next_due_picks_earliest_job() {
        let (s, _, _dir) = scheduler(1, false);
        let (job, when) = s.next_due(at(30, 23, 0)).unwrap();
        // 2026-07-01 02:00 daily beats 03:00 monthly.
        assert_eq!(job.kind, JobKind::Daily);
        assert_eq!(when, NaiveDate::from_ymd_opt(2026, 7, 1).unwrap().and_hms_opt(2, 0, 0).unwrap());

        let (job, _) = s.next_due(at(1, 2, 30)).unwrap();
        assert_eq!(job.kind, JobKind::Monthly);
    }

    #[test]
    fn test_requests_follow_job_plan() {
        let jobs: Vec<ScheduledJob> = serde_yaml::from_str::<ScheduleConfig>(
            "daily: { enabled: true }\nweekly: { enabled: true, extractions: [visits] }",
        )
        .unwrap()
        .jobs()
        .unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 6, 10).unwrap();

        let daily = Scheduler::request_for(&jobs[0], today);
        assert!(daily.incremental);
        assert_eq!(daily.start_date, NaiveDate::from_ymd_opt(2026, 6, 9));
        assert_eq!(daily.end_date, Some(today));

        let weekly = Scheduler::request_for(&jobs[1], today);
        assert!(!weekly.incremental);
        assert_eq!(weekly.start_date, NaiveDate::from_ymd_opt(2026, 6, 3));
        assert_eq!(weekly.sources, Some(vec!["visits".to_string()]));
    }

    #[tokio::test]
    async fn test_quality_alert_after_successful_job() -> anyhow::Result<()> {
        let (s, sink, _dir) = scheduler(3, false);
        let job = s.jobs()[0].clone();

        let summary = s.run_job(&job).await?;
        assert!(summary.is_success());

        let alerts = sink.0.lock().unwrap();
        // 3 rows under a minimum of 5.
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::QualityCheckFailure);
        assert_eq!(alerts[0].severity, Severity::Medium);
        Ok(())
    }

    #[tokio::test]
    async fn test_extraction_errors_raise_high_alert() -> anyhow::Result<()> {
        let (s, sink, _dir) = scheduler(0, true);
        let job = s.jobs()[1].clone();

        let summary = s.run_job(&job).await?;
        assert!(summary.is_success());
        assert!(summary.extraction_errors.contains_key("visits"));

        let alerts = sink.0.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::ExtractionFailure);
        assert_eq!(alerts[0].severity, Severity::High);
        Ok(())
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() -> anyhow::Result<()> {
        let (s, sink, _dir) = scheduler(10, false);
        s.run_until(async {}).await?;
        assert!(sink.0.lock().unwrap().is_empty());
        assert!(s.pipeline.extractor().checkpoints().all()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_capitalized_job_names() {
        assert_eq!(capitalize(JobKind::Weekly), "Weekly");
    }
}
