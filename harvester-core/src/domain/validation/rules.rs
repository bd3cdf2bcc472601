// harvester-core/src/domain/validation/rules.rs

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use validator::Validate;

/// The `quality_checks` section of the project config.
#[derive(Debug, Deserialize, Serialize, Validate, Clone, Default)]
pub struct QualityConfig {
    #[serde(default)]
    #[validate(nested)]
    pub row_count: RowCountRule,
    #[serde(default)]
    #[validate(nested)]
    pub null_checks: NullCheckRule,
    #[serde(default)]
    pub date_validation: DateRule,
    #[serde(default)]
    pub duplicate_checks: DuplicateRule,
    #[serde(default)]
    pub referential_integrity: IntegrityRule,
}

#[derive(Debug, Deserialize, Serialize, Validate, Clone)]
pub struct RowCountRule {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_min_rows")]
    pub min_rows: usize,
}

impl Default for RowCountRule {
    fn default() -> Self {
        Self {
            enabled: true,
            min_rows: default_min_rows(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Validate, Clone)]
pub struct NullCheckRule {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub critical_columns: Vec<String>,
    #[serde(default = "default_max_null_percentage")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub max_null_percentage: f64,
}

impl Default for NullCheckRule {
    fn default() -> Self {
        Self {
            enabled: true,
            critical_columns: Vec::new(),
            max_null_percentage: default_max_null_percentage(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DateRule {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_min_date")]
    pub min_date: NaiveDate,
    #[serde(default)]
    pub max_date: DateBound,
}

impl Default for DateRule {
    fn default() -> Self {
        Self {
            enabled: true,
            min_date: default_min_date(),
            max_date: DateBound::default(),
        }
    }
}

/// Upper date bound: a fixed day or the `today` sentinel, resolved at check time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    Today,
    Fixed(NaiveDate),
}

impl Default for DateBound {
    fn default() -> Self {
        DateBound::Fixed(NaiveDate::from_ymd_opt(2099, 12, 31).unwrap_or(NaiveDate::MAX))
    }
}

impl DateBound {
    /// The inclusive upper limit: midnight of the fixed day, or `now` for the sentinel.
    pub fn resolve(&self, now: NaiveDateTime) -> NaiveDateTime {
        match self {
            DateBound::Today => now,
            DateBound::Fixed(d) => d.and_time(NaiveTime::MIN),
        }
    }
}

impl<'de> Deserialize<'de> for DateBound {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.eq_ignore_ascii_case("today") || raw.eq_ignore_ascii_case("now") {
            return Ok(DateBound::Today);
        }
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(DateBound::Fixed)
            .map_err(serde::de::Error::custom)
    }
}

impl Serialize for DateBound {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DateBound::Today => serializer.serialize_str("today"),
            DateBound::Fixed(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DuplicateRule {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub key_columns: Vec<String>,
}

impl Default for DuplicateRule {
    fn default() -> Self {
        Self {
            enabled: true,
            key_columns: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IntegrityRule {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Default for IntegrityRule {
    fn default() -> Self {
        Self {
            enabled: true,
            relationships: Vec::new(),
        }
    }
}

/// A foreign key from a child source to a parent source.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Relationship {
    pub child: String,
    pub parent: String,
    pub foreign_key: String,
}

/// Per-source metadata the checks need (primary key, declared date column).
#[derive(Debug, Clone, Default)]
pub struct SourceRules {
    pub primary_key: Option<String>,
    pub date_column: Option<String>,
}

fn enabled() -> bool {
    true
}
fn default_min_rows() -> usize {
    100
}
fn default_max_null_percentage() -> f64 {
    5.0
}
fn default_min_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or(NaiveDate::MIN)
}
