// harvester-core/src/domain/dataset/value.rs

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A typed scalar cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Float(f64),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Text(String),
}

/// Formats accepted when coercing text to a date-time.
const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%Y%m%d"];

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_)) && !self.is_null()
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    /// Coerce to a date-time. `None` for nulls and anything unparseable.
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            Value::Date(d) => Some(d.and_time(NaiveTime::MIN)),
            Value::Text(s) => parse_datetime(s),
            _ => None,
        }
    }

    /// Hashable identity used for duplicate and key matching.
    pub fn key(&self) -> ValueKey {
        match self {
            v if v.is_null() => ValueKey::Null,
            Value::Integer(i) => ValueKey::Integer(*i),
            // Integral floats compare equal to integers (e.g. 4.0 == 4).
            Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                ValueKey::Integer(*f as i64)
            }
            Value::Float(f) => ValueKey::Float(f.to_bits()),
            Value::DateTime(dt) => ValueKey::DateTime(*dt),
            Value::Date(d) => ValueKey::DateTime(d.and_time(NaiveTime::MIN)),
            Value::Text(s) => ValueKey::Text(s.clone()),
            Value::Null => ValueKey::Null,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            v if v.is_null() => serde_json::Value::Null,
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::DateTime(dt) => serde_json::Value::from(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            Value::Date(d) => serde_json::Value::from(d.format("%Y-%m-%d").to_string()),
            Value::Text(s) => serde_json::Value::from(s.as_str()),
            Value::Null => serde_json::Value::Null,
        }
    }
}

pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    None
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKey {
    Null,
    Integer(i64),
    Float(u64),
    DateTime(NaiveDateTime),
    Text(String),
}
