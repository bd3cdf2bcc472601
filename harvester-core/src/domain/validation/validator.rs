// harvester-core/src/domain/validation/validator.rs

use std::collections::BTreeMap;

use chrono::{Local, NaiveDateTime};
use tracing::{debug, instrument};

use super::checks;
use super::report::{ValidationReport, ValidationResult};
use super::rules::{QualityConfig, SourceRules};
use crate::domain::dataset::Dataset;

/// Runs the configured check suite over one dataset at a time.
///
/// The validator holds only immutable configuration: every call to
/// [`DataValidator::validate`] produces a fresh [`ValidationReport`], so the
/// same instance can be reused across sources without any reset.
#[derive(Debug, Clone)]
pub struct DataValidator {
    config: QualityConfig,
    sources: BTreeMap<String, SourceRules>,
}

impl DataValidator {
    pub fn new(config: QualityConfig, sources: BTreeMap<String, SourceRules>) -> Self {
        Self { config, sources }
    }

    /// [`DataValidator::validate_at`] with the `today` date bound taken from the local clock.
    pub fn validate(
        &self,
        data: &Dataset,
        source: &str,
        reference_data: &BTreeMap<String, Dataset>,
    ) -> ValidationReport {
        self.validate_at(data, source, reference_data, Local::now().naive_local())
    }

    /// Checks run in a fixed order and never short-circuit each other:
    /// row count, nulls, date ranges, duplicates, data types, value ranges,
    /// then referential integrity when a reference pool is supplied.
    ///
    /// A `today` date bound resolves to `now`.
    #[instrument(skip(self, data, reference_data), fields(rows = data.row_count()))]
    pub fn validate_at(
        &self,
        data: &Dataset,
        source: &str,
        reference_data: &BTreeMap<String, Dataset>,
        now: NaiveDateTime,
    ) -> ValidationReport {
        let cfg = &self.config;
        let source_rules = self.sources.get(source).cloned().unwrap_or_default();
        let mut results: Vec<ValidationResult> = Vec::new();

        if cfg.row_count.enabled {
            results.push(checks::check_row_count(data, &cfg.row_count));
        }

        if cfg.null_checks.enabled && !cfg.null_checks.critical_columns.is_empty() {
            results.push(checks::check_null_values(data, &cfg.null_checks));
        }

        if cfg.date_validation.enabled {
            results.push(checks::check_date_ranges(data, &cfg.date_validation, &source_rules, now));
        }

        if cfg.duplicate_checks.enabled {
            results.push(checks::check_duplicates(data, &cfg.duplicate_checks, &source_rules));
        }

        results.push(checks::check_data_types(data));
        results.push(checks::check_value_ranges(data));

        if cfg.referential_integrity.enabled && !reference_data.is_empty() {
            results.extend(checks::check_referential_integrity(
                data,
                source,
                &cfg.referential_integrity,
                reference_data,
                &self.sources,
            ));
        }

        for result in &results {
            debug!(check = %result.check_name, passed = result.passed, "{}", result.message);
        }

        ValidationReport::new(source, results)
    }
}
