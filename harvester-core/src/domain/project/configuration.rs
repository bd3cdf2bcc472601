// harvester-core/src/domain/project/configuration.rs

use crate::domain::alert::MonitoringConfig;
use crate::domain::retry::RetryConfig;
use crate::domain::schedule::ScheduleConfig;
use crate::domain::validation::{QualityConfig, SourceRules};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use validator::Validate;

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct ProjectConfig {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseConfig>,

    /// Database used for extraction when several are declared.
    #[serde(default)]
    pub default_database: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub data_sources: BTreeMap<String, SourceConfig>,

    #[serde(default)]
    #[validate(nested)]
    pub quality_checks: QualityConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ProjectConfig {
    /// Primary key and date column per source, as the validator needs them.
    pub fn source_rules(&self) -> BTreeMap<String, SourceRules> {
        self.data_sources
            .iter()
            .map(|(name, src)| (name.clone(), src.rules()))
            .collect()
    }

    /// The database to extract from: the declared default, or the only one declared.
    pub fn extraction_database(&self) -> Option<(&str, &DatabaseConfig)> {
        match &self.default_database {
            Some(name) => self
                .databases
                .get_key_value(name)
                .map(|(k, v)| (k.as_str(), v)),
            None if self.databases.len() == 1 => {
                self.databases.iter().next().map(|(k, v)| (k.as_str(), v))
            }
            None => None,
        }
    }

    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.data_sources.get(name)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(rename = "type", default = "default_database_type")]
    pub kind: String,
    pub path: PathBuf,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct ExtractionConfig {
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1))]
    pub batch_size: usize,
    #[serde(default)]
    pub incremental: IncrementalConfig,
    #[serde(default)]
    #[validate(nested)]
    pub retry: RetryConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            incremental: IncrementalConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IncrementalConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: PathBuf,
    #[serde(default = "default_lookback_days")]
    pub default_lookback_days: u32,
}

impl Default for IncrementalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            checkpoint_file: default_checkpoint_file(),
            default_lookback_days: default_lookback_days(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    pub table: String,
    #[serde(default)]
    pub incremental: bool,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub date_column: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl SourceConfig {
    pub fn rules(&self) -> SourceRules {
        SourceRules {
            primary_key: self.primary_key.clone(),
            date_column: self.date_column.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
    #[serde(default = "default_compression")]
    pub compression: String,
    /// Template over `source`, `date`, `timestamp` and `format`.
    #[serde(default = "default_naming_pattern")]
    pub naming_pattern: String,
    #[serde(default)]
    pub paths: OutputPaths,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            formats: default_formats(),
            compression: default_compression(),
            naming_pattern: default_naming_pattern(),
            paths: OutputPaths::default(),
        }
    }
}

/// Variables available to `output.naming_pattern`.
#[derive(Debug, Clone, Serialize)]
pub struct FileNameVars<'a> {
    pub source: &'a str,
    /// `YYYYMMDD`
    pub date: String,
    /// `YYYYMMDD_HHMMSS`
    pub timestamp: String,
    pub format: &'a str,
}

impl<'a> FileNameVars<'a> {
    pub fn new(source: &'a str, at: DateTime<Local>, format: &'a str) -> Self {
        Self {
            source,
            date: at.format("%Y%m%d").to_string(),
            timestamp: at.format("%Y%m%d_%H%M%S").to_string(),
            format,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OutputPaths {
    #[serde(default = "default_raw_path")]
    pub raw: PathBuf,
    #[serde(default = "default_processed_path")]
    pub processed: PathBuf,
    #[serde(default = "default_results_path")]
    pub results: PathBuf,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            raw: default_raw_path(),
            processed: default_processed_path(),
            results: default_results_path(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PipelineConfig {
    #[serde(default)]
    pub stop_on_validation_failure: bool,
    #[serde(default = "enabled")]
    pub save_raw: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stop_on_validation_failure: false,
            save_raw: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Directory for daily-rotated log files. No file logging when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
            dir: None,
        }
    }
}

fn enabled() -> bool {
    true
}
fn default_name() -> String {
    "harvester".to_string()
}
fn default_database_type() -> String {
    "duckdb".to_string()
}
fn default_batch_size() -> usize {
    10_000
}
fn default_checkpoint_file() -> PathBuf {
    PathBuf::from("data/checkpoints/extraction_checkpoints.json")
}
fn default_lookback_days() -> u32 {
    30
}
fn default_formats() -> Vec<String> {
    vec!["parquet".to_string()]
}
fn default_compression() -> String {
    "gzip".to_string()
}
fn default_naming_pattern() -> String {
    "{{ source }}_{{ timestamp }}.{{ format }}".to_string()
}
fn default_raw_path() -> PathBuf {
    PathBuf::from("data/raw")
}
fn default_processed_path() -> PathBuf {
    PathBuf::from("data/processed")
}
fn default_results_path() -> PathBuf {
    PathBuf::from("results/metrics")
}
fn default_log_level() -> String {
    "info".to_string()
}
