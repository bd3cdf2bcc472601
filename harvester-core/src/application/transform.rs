// harvester-core/src/application/transform.rs

use chrono::NaiveDateTime;
use tracing::info;

use crate::domain::dataset::{ColumnType, Dataset, Value};
use crate::error::HarvestError;

pub const EXTRACTION_DATE_COLUMN: &str = "extraction_date";
pub const RUN_ID_COLUMN: &str = "run_id";

/// Lower-case, spaces to underscores.
pub fn normalize_column_name(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// Prepares one extracted dataset for output.
///
/// Exact duplicate rows are dropped (first occurrence kept), every column
/// whose name mentions "date" is coerced to a date-time, column names are
/// normalized, and each row is stamped with the extraction time and run id.
/// Empty datasets are returned unchanged.
///
/// Fails when two columns normalize to the same name.
pub fn transform_dataset(
    data: &Dataset,
    source: &str,
    run_id: &str,
    extracted_at: NaiveDateTime,
) -> Result<Dataset, HarvestError> {
    if data.is_empty() {
        info!("Skipping transformation for empty source: {}", source);
        return Ok(data.clone());
    }

    let mut out = data.drop_duplicate_rows();
    let dropped = data.row_count() - out.row_count();
    if dropped > 0 {
        info!(dropped, "Removed {} duplicate rows from {}", dropped, source);
    }

    let date_columns: Vec<String> = out
        .columns()
        .iter()
        .filter(|c| c.to_lowercase().contains("date"))
        .cloned()
        .collect();
    for column in &date_columns {
        out = out.coerce_datetime(column);
    }

    out = out
        .rename_columns(normalize_column_name)
        .map_err(|e| HarvestError::Transform {
            source_name: source.to_string(),
            message: e.to_string(),
        })?
        .with_constant_column(
            EXTRACTION_DATE_COLUMN,
            Value::DateTime(extracted_at),
            ColumnType::DateTime,
        )
        .with_constant_column(RUN_ID_COLUMN, Value::from(run_id), ColumnType::Text);

    info!(
        rows = out.row_count(),
        columns = out.columns().len(),
        "{}: Transformed {} rows",
        source,
        out.row_count()
    );
    Ok(out)
}
