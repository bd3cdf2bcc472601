// harvester-core/src/application/extraction.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Days, Local, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::application::ports::TemplateEngine;
use crate::domain::dataset::Dataset;
use crate::domain::error::DomainError;
use crate::domain::pipeline::{OperationMetric, Stopwatch};
use crate::domain::ports::CheckpointStore;
use crate::domain::project::{ExtractionConfig, ProjectConfig, QueryCatalog, QueryVars, SourceConfig};
use crate::domain::retry::{RetryDisposition, RetryPolicy};
use crate::error::HarvestError;
use crate::ports::clock::{Clock, SystemClock};
use crate::ports::source::{ExtractionSource, PageRequest};

/// Datasets from one multi-source extraction, plus what failed along the way.
///
/// A failed source is present in `datasets` as an empty dataset and its error
/// message is kept in `errors`, so "no rows" and "errored" stay distinguishable.
#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    pub datasets: BTreeMap<String, Dataset>,
    pub errors: BTreeMap<String, String>,
    /// One `extract:<source>` timing per attempted source.
    pub metrics: Vec<OperationMetric>,
}

impl ExtractionOutcome {
    pub fn total_rows(&self) -> usize {
        self.datasets.values().map(Dataset::row_count).sum()
    }

    pub fn is_failed(&self, source: &str) -> bool {
        self.errors.contains_key(source)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionStats {
    pub source: String,
    pub last_extraction_date: Option<DateTime<Utc>>,
    pub incremental_enabled: bool,
    pub table: String,
}

/// Checkpoint and source metadata for one configured source.
pub fn extraction_stats(
    checkpoints: &dyn CheckpointStore,
    data_sources: &BTreeMap<String, SourceConfig>,
    source: &str,
) -> Result<ExtractionStats, HarvestError> {
    let config = data_sources
        .get(source)
        .ok_or_else(|| DomainError::UnknownSource(source.to_string()))?;
    Ok(ExtractionStats {
        source: source.to_string(),
        last_extraction_date: checkpoints.get_last_extraction(source)?,
        incremental_enabled: config.incremental,
        table: config.table.clone(),
    })
}

/// Pages query results out of an [`ExtractionSource`] and keeps checkpoints.
pub struct BatchExtractor {
    source: Arc<dyn ExtractionSource>,
    checkpoints: Arc<dyn CheckpointStore>,
    templates: Arc<dyn TemplateEngine>,
    clock: Arc<dyn Clock>,
    settings: ExtractionConfig,
    data_sources: BTreeMap<String, SourceConfig>,
    queries: QueryCatalog,
    retry: RetryPolicy,
}

impl BatchExtractor {
    pub fn new(
        config: &ProjectConfig,
        queries: QueryCatalog,
        source: Arc<dyn ExtractionSource>,
        checkpoints: Arc<dyn CheckpointStore>,
        templates: Arc<dyn TemplateEngine>,
    ) -> Self {
        Self {
            source,
            checkpoints,
            templates,
            clock: Arc::new(SystemClock),
            settings: config.extraction.clone(),
            data_sources: config.data_sources.clone(),
            queries,
            retry: RetryPolicy::from(config.extraction.retry.clone()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn data_sources(&self) -> &BTreeMap<String, SourceConfig> {
        &self.data_sources
    }

    pub fn checkpoints(&self) -> &dyn CheckpointStore {
        self.checkpoints.as_ref()
    }

    /// Extracts one source through the paging loop.
    ///
    /// `incremental` defaults to the source's own flag combined with the
    /// global incremental switch. Transient failures restart the whole loop
    /// from offset 0; configuration errors fail at once.
    #[instrument(skip(self))]
    pub async fn extract(
        &self,
        source: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        incremental: Option<bool>,
        batch_size: Option<usize>,
    ) -> Result<Dataset, HarvestError> {
        self.retry
            .run(
                || self.extract_once(source, start_date, end_date, incremental, batch_size),
                classify,
            )
            .await
    }

    async fn extract_once(
        &self,
        source: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        incremental: Option<bool>,
        batch_size: Option<usize>,
    ) -> Result<Dataset, HarvestError> {
        info!("Starting extraction for source: {}", source);

        let config = self
            .data_sources
            .get(source)
            .ok_or_else(|| DomainError::UnknownSource(source.to_string()))?;
        let incremental =
            incremental.unwrap_or(config.incremental && self.settings.incremental.enabled);
        let template = self
            .queries
            .get(source)
            .ok_or_else(|| DomainError::MissingQueryTemplate(source.to_string()))?;

        let now = self.clock.now();
        let start_date = match start_date {
            Some(d) => Some(d),
            None if incremental => Some(self.window_start(source, now)?),
            None => None,
        };
        let end_date = end_date.or(Some(now.date_naive()));

        let sql = template
            .select(incremental)
            .ok_or_else(|| DomainError::MissingQueryTemplate(source.to_string()))?;
        let batch_size = batch_size.unwrap_or(self.settings.batch_size).max(1);
        let vars = QueryVars::new(&config.table, start_date, end_date, batch_size, 0);

        let data = self.fetch_pages(source, sql, &vars).await?;

        if data.is_empty() {
            warn!("No data extracted for {}", source);
            return Ok(data);
        }
        info!(rows = data.row_count(), "Extraction complete for {}", source);

        if incremental {
            self.advance_checkpoint(source, now)?;
        }
        Ok(data)
    }

    /// Last checkpoint date, or the configured lookback before `now`.
    fn window_start(&self, source: &str, now: DateTime<Utc>) -> Result<NaiveDate, HarvestError> {
        if let Some(last) = self.checkpoints.get_last_extraction(source)? {
            return Ok(last.date_naive());
        }
        let lookback = Days::new(u64::from(self.settings.incremental.default_lookback_days));
        let today = now.date_naive();
        Ok(today.checked_sub_days(lookback).unwrap_or(today))
    }

    fn advance_checkpoint(&self, source: &str, now: DateTime<Utc>) -> Result<(), HarvestError> {
        let when = match self.checkpoints.get_last_extraction(source)? {
            Some(previous) if previous > now => previous,
            _ => now,
        };
        self.checkpoints.save_checkpoint(source, when)?;
        info!(checkpoint = %when, "Checkpoint saved for {}", source);
        Ok(())
    }

    async fn fetch_pages(
        &self,
        source: &str,
        template: &str,
        vars: &QueryVars<'_>,
    ) -> Result<Dataset, HarvestError> {
        let limit = vars.batch_size;
        let mut data = Dataset::empty();
        let mut offset = 0;

        loop {
            let sql = self.templates.render(template, &vars.at_offset(offset).to_json())?;
            debug!(offset, limit, "Extracting batch at offset {}", offset);

            let page = self
                .source
                .fetch_page(&PageRequest {
                    source: source.to_string(),
                    sql,
                    offset,
                    limit,
                })
                .await?;

            let returned = page.row_count();
            if returned > limit {
                return Err(DomainError::PageOverflow {
                    source_name: source.to_string(),
                    offset,
                    limit,
                    returned,
                }
                .into());
            }
            if returned == 0 {
                // Keep the header of an empty result.
                if data.columns().is_empty() {
                    data = page;
                }
                debug!("No more data to extract for {}", source);
                break;
            }

            data.append(page)?;
            offset += limit;
            info!(rows = returned, total = data.row_count(), "Extracted batch");

            if returned < limit {
                break;
            }
        }

        Ok(data)
    }

    /// Reads a reference source with its single unpaged query.
    #[instrument(skip(self))]
    pub async fn extract_reference(&self, source: &str) -> Result<Dataset, HarvestError> {
        self.retry
            .run(|| self.extract_reference_once(source), classify)
            .await
    }

    async fn extract_reference_once(&self, source: &str) -> Result<Dataset, HarvestError> {
        info!("Extracting reference data: {}", source);
        let config = self
            .data_sources
            .get(source)
            .ok_or_else(|| DomainError::UnknownSource(source.to_string()))?;
        let template = self
            .queries
            .get(source)
            .and_then(|t| t.reference())
            .ok_or_else(|| DomainError::MissingQueryTemplate(source.to_string()))?;

        let vars = QueryVars::new(&config.table, None, None, self.settings.batch_size, 0);
        let sql = self.templates.render(template, &vars.to_json())?;
        let data = self.source.fetch_all(&sql).await?;

        info!(rows = data.row_count(), "Reference data extraction complete");
        Ok(data)
    }

    /// Extracts several sources one after the other.
    ///
    /// Incremental sources go through the paging loop, the others are read as
    /// reference data. A failing source never stops the others.
    #[instrument(skip(self))]
    pub async fn extract_all(
        &self,
        sources: Option<&[String]>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        incremental: bool,
    ) -> ExtractionOutcome {
        let names: Vec<String> = match sources {
            Some(list) => list.to_vec(),
            None => self.data_sources.keys().cloned().collect(),
        };

        let mut outcome = ExtractionOutcome::default();
        for name in names {
            let stopwatch = Stopwatch::start(self.clock.now().with_timezone(&Local));
            let result = match self.data_sources.get(&name) {
                Some(config) if config.incremental => {
                    let incremental = incremental && self.settings.incremental.enabled;
                    self.extract(&name, start_date, end_date, Some(incremental), None)
                        .await
                }
                Some(_) => self.extract_reference(&name).await,
                None => Err(DomainError::UnknownSource(name.clone()).into()),
            };

            let mut metric = stopwatch.stop(
                format!("extract:{}", name),
                self.clock.now().with_timezone(&Local),
                &result,
            );
            if let Ok(data) = &result {
                metric = metric.with_rows(data.row_count());
            }
            outcome.metrics.push(metric);

            match result {
                Ok(data) => {
                    outcome.datasets.insert(name, data);
                }
                Err(e) => {
                    error!(source = %name, "Failed to extract {}: {}", name, e);
                    outcome.datasets.insert(name.clone(), Dataset::empty());
                    outcome.errors.insert(name, e.to_string());
                }
            }
        }
        outcome
    }

    pub fn extraction_stats(&self, source: &str) -> Result<ExtractionStats, HarvestError> {
        extraction_stats(self.checkpoints.as_ref(), &self.data_sources, source)
    }
}

fn classify(err: &HarvestError) -> RetryDisposition {
    if err.is_transient() {
        RetryDisposition::Retry
    } else {
        RetryDisposition::Stop
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::dataset::Value;
    use crate::domain::project::QueryTemplate;
    use crate::domain::retry::Backoff;
    use crate::infrastructure::compiler::jinja::JinjaRenderer;
    use crate::ports::clock::FixedClock;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves `total` rows of a single `id` column, page by page.
    struct PagedSource {
        total: usize,
        /// Fail every fetch whose call number (0-based) is listed.
        failing_calls: Vec<usize>,
        calls: AtomicUsize,
        requests: Mutex<Vec<PageRequest>>,
        oversize: bool,
    }

    impl PagedSource {
        fn new(total: usize) -> Self {
            Self {
                total,
                failing_calls: Vec::new(),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
                oversize: false,
            }
        }

        fn failing_on(mut self, calls: &[usize]) -> Self {
            self.failing_calls = calls.to_vec();
            self
        }

        fn offsets(&self) -> Vec<usize> {
            self.requests.lock().unwrap().iter().map(|r| r.offset).collect()
        }

        fn rows(&self, from: usize, to: usize) -> Dataset {
            let rows = (from..to).map(|i| vec![Value::Integer(i as i64)]).collect();
            Dataset::new(vec!["id".into()], rows).unwrap()
        }
    }

    #[async_trait]
    impl ExtractionSource for PagedSource {
        async fn fetch_page(&self, request: &PageRequest) -> Result<Dataset, HarvestError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            if self.failing_calls.contains(&call) {
                return Err(HarvestError::Extraction {
                    source_name: request.source.clone(),
                    message: "connection reset".into(),
                });
            }
            let from = request.offset.min(self.total);
            let extra = if self.oversize { 1 } else { 0 };
            let to = (request.offset + request.limit + extra).min(self.total);
            Ok(self.rows(from, to))
        }

        async fn fetch_all(&self, _sql: &str) -> Result<Dataset, HarvestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rows(0, self.total))
        }
    }

    #[derive(Default)]
    struct MemoryCheckpoints(Mutex<BTreeMap<String, DateTime<Utc>>>);

    impl CheckpointStore for MemoryCheckpoints {
        fn get_last_extraction(&self, source: &str) -> Result<Option<DateTime<Utc>>, HarvestError> {
            Ok(self.0.lock().unwrap().get(source).copied())
        }

        fn save_checkpoint(&self, source: &str, when: DateTime<Utc>) -> Result<(), HarvestError> {
            self.0.lock().unwrap().insert(source.to_string(), when);
            Ok(())
        }

        fn all(&self) -> Result<BTreeMap<String, DateTime<Utc>>, HarvestError> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    fn noon(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap()
    }

    fn config() -> ProjectConfig {
        serde_yaml::from_str(
            r#"
extraction: { batch_size: 10 }
data_sources:
  visits: { table: visits, incremental: true, primary_key: id }
  clinics: { table: clinics }
"#,
        )
        .unwrap()
    }

    fn queries() -> QueryCatalog {
        let mut catalog = QueryCatalog::default();
        catalog.queries.insert(
            "visits".into(),
            QueryTemplate {
                incremental_query: Some(
                    "SELECT * FROM {{ table }} WHERE d >= '{{ start_date }}' AND d <= '{{ end_date }}' LIMIT {{ batch_size }} OFFSET {{ batch_offset }}".into(),
                ),
                full_query: Some(
                    "SELECT * FROM {{ table }} LIMIT {{ batch_size }} OFFSET {{ batch_offset }}".into(),
                ),
                query: None,
            },
        );
        catalog.queries.insert(
            "clinics".into(),
            QueryTemplate {
                query: Some("SELECT * FROM {{ table }}".into()),
                ..Default::default()
            },
        );
        catalog
    }

    fn extractor(
        source: Arc<PagedSource>,
        checkpoints: Arc<MemoryCheckpoints>,
        now: DateTime<Utc>,
    ) -> BatchExtractor {
        BatchExtractor::new(
            &config(),
            queries(),
            source,
            checkpoints,
            Arc::new(JinjaRenderer::new()),
        )
        .with_clock(Arc::new(FixedClock(now)))
        .with_retry(RetryPolicy::new(3, Duration::ZERO, Backoff::Fixed))
    }

    #[tokio::test]
    async fn test_fetch_count_follows_page_arithmetic() -> anyhow::Result<()> {
        // (rows, expected fetches) with batch size 10
        for (total, fetches) in [(0, 1), (7, 1), (10, 2), (25, 3), (30, 4)] {
            let source = Arc::new(PagedSource::new(total));
            let ex = extractor(source.clone(), Arc::default(), noon(10));
            let data = ex.extract("visits", None, None, Some(false), None).await?;
            assert_eq!(data.row_count(), total, "rows for {total}");
            assert_eq!(source.calls.load(Ordering::SeqCst), fetches, "fetches for {total}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_result_keeps_columns() -> anyhow::Result<()> {
        let ex = extractor(Arc::new(PagedSource::new(0)), Arc::default(), noon(10));
        let data = ex.extract("visits", None, None, Some(false), None).await?;
        assert!(data.is_empty());
        assert_eq!(data.columns(), ["id"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_retry_restarts_from_first_page() -> anyhow::Result<()> {
        // Fails on the third fetch (offset 20), then succeeds on the next attempt.
        let source = Arc::new(PagedSource::new(25).failing_on(&[2]));
        let ex = extractor(source.clone(), Arc::default(), noon(10));

        let data = ex.extract("visits", None, None, Some(false), None).await?;
        assert_eq!(data.row_count(), 25);
        assert_eq!(source.offsets(), vec![0, 10, 20, 0, 10, 20]);
        Ok(())
    }

    #[tokio::test]
    async fn test_final_failure_is_propagated_unchanged() {
        let source = Arc::new(PagedSource::new(5).failing_on(&[0, 1, 2, 3]));
        let checkpoints = Arc::new(MemoryCheckpoints::default());
        let ex = extractor(source.clone(), checkpoints.clone(), noon(10));

        let err = ex.extract("visits", None, None, None, None).await.unwrap_err();
        assert!(matches!(err, HarvestError::Extraction { ref message, .. } if message == "connection reset"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert!(checkpoints.all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_configuration_errors_are_not_retried() {
        let source = Arc::new(PagedSource::new(5));
        let ex = extractor(source.clone(), Arc::default(), noon(10));

        let err = ex.extract("ghost", None, None, None, None).await.unwrap_err();
        assert!(matches!(err, HarvestError::Domain(DomainError::UnknownSource(_))));

        let mut catalog = queries();
        catalog.queries.remove("visits");
        let ex = BatchExtractor::new(
            &config(),
            catalog,
            source.clone(),
            Arc::new(MemoryCheckpoints::default()),
            Arc::new(JinjaRenderer::new()),
        )
        .with_retry(RetryPolicy::new(3, Duration::ZERO, Backoff::Fixed));
        let err = ex.extract("visits", None, None, None, None).await.unwrap_err();
        assert!(matches!(err, HarvestError::Domain(DomainError::MissingQueryTemplate(_))));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_page_is_rejected() {
        let mut source = PagedSource::new(50);
        source.oversize = true;
        let source = Arc::new(source);
        let ex = extractor(source.clone(), Arc::default(), noon(10));

        let err = ex.extract("visits", None, None, Some(false), None).await.unwrap_err();
        assert!(matches!(
            err,
            HarvestError::Domain(DomainError::PageOverflow { returned: 11, limit: 10, .. })
        ));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_incremental_window_and_checkpoint() -> anyhow::Result<()> {
        let source = Arc::new(PagedSource::new(3));
        let checkpoints = Arc::new(MemoryCheckpoints::default());

        // First run: no checkpoint, 30-day lookback.
        let ex = extractor(source.clone(), checkpoints.clone(), noon(31));
        ex.extract("visits", None, None, None, None).await?;
        let first = source.requests.lock().unwrap()[0].sql.clone();
        assert!(first.contains("d >= '2026-03-01'"), "{first}");
        assert!(first.contains("d <= '2026-03-31'"), "{first}");
        assert_eq!(checkpoints.get_last_extraction("visits")?, Some(noon(31)));

        // A clock running behind never moves the checkpoint backwards.
        let ex = extractor(source.clone(), checkpoints.clone(), noon(20));
        ex.extract("visits", None, None, None, None).await?;
        let second = source.requests.lock().unwrap()[1].sql.clone();
        assert!(second.contains("d >= '2026-03-31'"), "{second}");
        assert_eq!(checkpoints.get_last_extraction("visits")?, Some(noon(31)));
        Ok(())
    }

    #[tokio::test]
    async fn test_full_run_uses_full_query_and_skips_checkpoint() -> anyhow::Result<()> {
        let source = Arc::new(PagedSource::new(3));
        let checkpoints = Arc::new(MemoryCheckpoints::default());
        let ex = extractor(source.clone(), checkpoints.clone(), noon(10));

        ex.extract("visits", None, None, Some(false), Some(5)).await?;
        let sql = source.requests.lock().unwrap()[0].sql.clone();
        assert_eq!(sql, "SELECT * FROM visits LIMIT 5 OFFSET 0");
        assert!(checkpoints.all()?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_extract_all_isolates_failures() {
        let source = Arc::new(PagedSource::new(4).failing_on(&[0, 1, 2]));
        let ex = extractor(source, Arc::default(), noon(10));

        let names = vec!["visits".to_string(), "clinics".to_string(), "ghost".to_string()];
        let outcome = ex.extract_all(Some(&names), None, None, true).await;

        assert!(outcome.is_failed("visits"));
        assert!(outcome.datasets["visits"].is_empty());
        assert_eq!(outcome.datasets["clinics"].row_count(), 4);
        assert!(outcome.errors["ghost"].contains("Unknown data source"));
        assert_eq!(outcome.total_rows(), 4);

        let timed: Vec<_> = outcome
            .metrics
            .iter()
            .map(|m| (m.operation.as_str(), m.is_success(), m.rows))
            .collect();
        assert_eq!(
            timed,
            vec![
                ("extract:visits", false, None),
                ("extract:clinics", true, Some(4)),
                ("extract:ghost", false, None),
            ]
        );
    }

    #[tokio::test]
    async fn test_stats_report_checkpoint() -> anyhow::Result<()> {
        let checkpoints = Arc::new(MemoryCheckpoints::default());
        checkpoints.save_checkpoint("visits", noon(2))?;
        let ex = extractor(Arc::new(PagedSource::new(0)), checkpoints, noon(10));

        let stats = ex.extraction_stats("visits")?;
        assert_eq!(stats.last_extraction_date, Some(noon(2)));
        assert!(stats.incremental_enabled);
        assert_eq!(stats.table, "visits");
        assert!(ex.extraction_stats("clinics")?.last_extraction_date.is_none());
        Ok(())
    }
}
