// harvester-core/src/infrastructure/adapters/duckdb.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use duckdb::types::{TimeUnit, ValueRef};
use duckdb::{AccessMode, Config, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::domain::dataset::{Dataset, Row, Value};
use crate::domain::project::DatabaseConfig;
use crate::error::HarvestError;
use crate::infrastructure::error::{DatabaseError, InfrastructureError};
use crate::ports::source::{ExtractionSource, PageRequest};

/// Days from 0001-01-01 to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Extraction source backed by a DuckDB database file.
pub struct DuckDbSource {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbSource {
    pub fn open(db_path: &Path, read_only: bool) -> Result<Self, InfrastructureError> {
        let mut config = Config::default();
        if read_only {
            config = config.access_mode(AccessMode::ReadOnly)?;
        }
        let conn = if db_path.as_os_str() == ":memory:" {
            Connection::open_in_memory_with_flags(config)?
        } else {
            Connection::open_with_flags(db_path, config)?
        };
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_config(db: &DatabaseConfig) -> Result<Self, InfrastructureError> {
        Self::open(&db.path, db.read_only)
    }

    pub fn in_memory() -> Result<Self, InfrastructureError> {
        Self::open(Path::new(":memory:"), false)
    }

    /// Runs a statement with no result set (setup, seeding).
    pub fn execute_batch(&self, sql: &str) -> Result<(), InfrastructureError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::Poisoned)?;
        conn.execute_batch(sql)?;
        Ok(())
    }

    fn query(&self, sql: &str) -> Result<Dataset, InfrastructureError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::Poisoned)?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;

        let columns: Vec<String> = match rows.as_ref() {
            Some(stmt_ref) => (0..stmt_ref.column_count())
                .map(|i| {
                    stmt_ref
                        .column_name(i)
                        .map(|s| s.to_string())
                        .unwrap_or_else(|_| format!("col{}", i))
                })
                .collect(),
            None => return Ok(Dataset::empty()),
        };

        let mut data: Vec<Row> = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(to_value(row.get_ref(i)?));
            }
            data.push(values);
        }

        Ok(Dataset::new(columns, data)
            .map_err(|e| InfrastructureError::ConfigError(e.to_string()))?)
    }
}

fn to_micros(unit: TimeUnit, v: i64) -> i64 {
    match unit {
        TimeUnit::Second => v.saturating_mul(1_000_000),
        TimeUnit::Millisecond => v.saturating_mul(1_000),
        TimeUnit::Microsecond => v,
        TimeUnit::Nanosecond => v / 1_000,
    }
}

fn to_value(raw: ValueRef<'_>) -> Value {
    match raw {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(v) => Value::Integer(i64::from(v)),
        ValueRef::TinyInt(v) => Value::Integer(i64::from(v)),
        ValueRef::SmallInt(v) => Value::Integer(i64::from(v)),
        ValueRef::Int(v) => Value::Integer(i64::from(v)),
        ValueRef::BigInt(v) => Value::Integer(v),
        ValueRef::HugeInt(v) => i64::try_from(v).map(Value::Integer).unwrap_or(Value::Float(v as f64)),
        ValueRef::UTinyInt(v) => Value::Integer(i64::from(v)),
        ValueRef::USmallInt(v) => Value::Integer(i64::from(v)),
        ValueRef::UInt(v) => Value::Integer(i64::from(v)),
        ValueRef::UBigInt(v) => i64::try_from(v).map(Value::Integer).unwrap_or(Value::Float(v as f64)),
        ValueRef::Float(v) => Value::Float(f64::from(v)),
        ValueRef::Double(v) => Value::Float(v),
        ValueRef::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or_else(|_| Value::Text(d.to_string())),
        ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).to_string()),
        ValueRef::Timestamp(unit, v) => {
            let micros = to_micros(unit, v);
            DateTime::from_timestamp_micros(micros)
                .map(|dt| Value::DateTime(dt.naive_utc()))
                .unwrap_or(Value::Integer(micros))
        }
        ValueRef::Date32(days) => NaiveDate::from_num_days_from_ce_opt(UNIX_EPOCH_DAYS_FROM_CE + days)
            .map(Value::Date)
            .unwrap_or(Value::Integer(i64::from(days))),
        other => {
            warn!(
                "DuckDB type {:?} mapped to debug string",
                std::mem::discriminant(&other)
            );
            Value::Text(format!("{:?}", other))
        }
    }
}

#[async_trait]
impl ExtractionSource for DuckDbSource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Dataset, HarvestError> {
        debug!(source = %request.source, offset = request.offset, limit = request.limit, "Fetching page");
        self.query(&request.sql).map_err(|e| extraction_error(&request.source, e))
    }

    async fn fetch_all(&self, sql: &str) -> Result<Dataset, HarvestError> {
        Ok(self.query(sql)?)
    }
}

/// Query failures are upstream failures: transient, worth a retry.
fn extraction_error(source: &str, err: InfrastructureError) -> HarvestError {
    match err {
        InfrastructureError::Database(db) => HarvestError::Extraction {
            source_name: source.to_string(),
            message: db.to_string(),
        },
        other => other.into(),
    }
}
