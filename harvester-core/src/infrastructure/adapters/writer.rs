// harvester-core/src/infrastructure/adapters/writer.rs

use duckdb::Connection;
use duckdb::types::{TimeUnit, Value as DuckValue};
use std::path::Path;
use tracing::{debug, instrument};

use crate::domain::dataset::{ColumnType, Dataset, Value};
use crate::error::HarvestError;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::writer::{DatasetWriter, OutputFormat};

const STAGING_TABLE: &str = "harvest_output";

/// Writes datasets through an in-memory DuckDB and `COPY ... TO`.
#[derive(Debug, Clone)]
pub struct DuckDbWriter {
    compression: String,
}

impl DuckDbWriter {
    pub fn new(compression: impl Into<String>) -> Self {
        Self {
            compression: compression.into().to_lowercase(),
        }
    }

    fn copy_options(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Parquet => {
                let codec = match self.compression.as_str() {
                    "" | "none" => "uncompressed",
                    other => other,
                };
                format!("FORMAT PARQUET, COMPRESSION {}", codec)
            }
            OutputFormat::Csv => {
                let codec = match self.compression.as_str() {
                    "gzip" | "zstd" => self.compression.as_str(),
                    _ => "none",
                };
                format!("FORMAT CSV, HEADER, COMPRESSION {}", codec)
            }
            OutputFormat::Json => "FORMAT JSON".to_string(),
        }
    }

    fn stage(conn: &Connection, data: &Dataset) -> Result<(), InfrastructureError> {
        let types: Vec<ColumnType> = data.columns().iter().map(|c| data.column_type(c)).collect();

        let column_defs: Vec<String> = data
            .columns()
            .iter()
            .zip(&types)
            .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.sql_name()))
            .collect();
        conn.execute_batch(&format!(
            "CREATE OR REPLACE TABLE {} ({})",
            STAGING_TABLE,
            column_defs.join(", ")
        ))?;

        let placeholders: Vec<String> = types
            .iter()
            .map(|ty| format!("TRY_CAST(? AS {})", ty.sql_name()))
            .collect();
        let insert = format!(
            "INSERT INTO {} VALUES ({})",
            STAGING_TABLE,
            placeholders.join(", ")
        );

        conn.execute_batch("BEGIN TRANSACTION")?;
        {
            let mut stmt = conn.prepare(&insert)?;
            for row in data.rows() {
                let params: Vec<DuckValue> = row.iter().map(to_param).collect();
                let param_refs: Vec<&dyn duckdb::ToSql> =
                    params.iter().map(|v| v as &dyn duckdb::ToSql).collect();
                stmt.execute(param_refs.as_slice())?;
            }
        }
        conn.execute_batch("COMMIT")?;
        Ok(())
    }
}

fn to_param(value: &Value) -> DuckValue {
    match value {
        v if v.is_null() => DuckValue::Null,
        Value::Integer(i) => DuckValue::BigInt(*i),
        Value::Float(f) => DuckValue::Double(*f),
        Value::DateTime(dt) => {
            DuckValue::Timestamp(TimeUnit::Microsecond, dt.and_utc().timestamp_micros())
        }
        Value::Date(d) => DuckValue::Text(d.format("%Y-%m-%d").to_string()),
        Value::Text(s) => DuckValue::Text(s.clone()),
        Value::Null => DuckValue::Null,
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

impl DatasetWriter for DuckDbWriter {
    #[instrument(skip(self, data), fields(rows = data.row_count()))]
    fn write(&self, data: &Dataset, path: &Path, format: OutputFormat) -> Result<(), HarvestError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_in_memory().map_err(InfrastructureError::from)?;
        Self::stage(&conn, data)?;

        let target = path.to_string_lossy();
        conn.execute_batch(&format!(
            "COPY {} TO {} ({})",
            STAGING_TABLE,
            quote_literal(&target),
            self.copy_options(format)
        ))
        .map_err(InfrastructureError::from)?;

        debug!(path = %target, %format, "Dataset written");
        Ok(())
    }
}
